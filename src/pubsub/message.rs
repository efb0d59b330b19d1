pub trait Message: Clone + Default + Send + Sync + 'static{}

//blanket impl for all types that meet constraints
impl<T: Clone + Default + Send + Sync + 'static> Message for T{}
