use std::sync::{Arc, PoisonError, RwLock};
use super::message::Message;
use super::notify::Notifier;

//latest-value slot; epoch 0 means nothing published yet
struct Sample<T>{
    value: T,
    epoch: u64,
}

pub struct Topic<T: Message>{
    name: String,
    latest: RwLock<Sample<T>>,
    notifier: Arc<Notifier>,
}

impl<T: Message> Topic<T>{
    pub fn new(name: &str) -> Self{
        Self::with_notifier(name, Arc::new(Notifier::new()))
    }

    pub fn with_notifier(name: &str, notifier: Arc<Notifier>) -> Self{
        Topic{
            name: name.to_string(),
            latest: RwLock::new(Sample{ value: T::default(), epoch: 0 }),
            notifier,
        }
    }

    pub fn name(&self) -> &str{
        &self.name
    }

    //overwrite the latest sample, return its epoch
    pub fn publish(&self, msg: T) -> u64{
        let epoch ={
            let mut sample = self.latest.write().unwrap_or_else(PoisonError::into_inner);
            sample.epoch += 1;
            sample.value = msg;
            sample.epoch
        };
        self.notifier.notify();
        epoch
    }

    pub fn latest(&self) -> Option<(T, u64)>{
        let sample = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        if sample.epoch == 0{
            return None;
        }
        Some((sample.value.clone(), sample.epoch))
    }

    pub fn latest_epoch(&self) -> u64{
        self.latest.read().unwrap_or_else(PoisonError::into_inner).epoch
    }

    pub fn notifier(&self) -> &Arc<Notifier>{
        &self.notifier
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::node::types::ActuatorControls;

    #[test]
    fn test_topic_keeps_latest_only(){
        let topic: Topic<i32> = Topic::new("/test/int");
        assert!(topic.latest().is_none());

        assert_eq!(topic.publish(10), 1);
        assert_eq!(topic.publish(20), 2);
        assert_eq!(topic.publish(30), 3);

        let (val, epoch) = topic.latest().unwrap();
        assert_eq!(val, 30);
        assert_eq!(epoch, 3);
        assert_eq!(topic.latest_epoch(), 3);
    }

    #[test]
    fn test_publish_bumps_shared_notifier(){
        let notifier = Arc::new(Notifier::new());
        let a: Topic<ActuatorControls> = Topic::with_notifier("actuator_controls_0", Arc::clone(&notifier));
        let b: Topic<ActuatorControls> = Topic::with_notifier("actuator_controls_1", Arc::clone(&notifier));

        a.publish(ActuatorControls::default());
        b.publish(ActuatorControls::default());

        assert_eq!(notifier.generation(), 2);
        assert_eq!(a.name(), "actuator_controls_0");
    }
}
