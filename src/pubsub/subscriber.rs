use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use super::topic::Topic;
use super::message::Message;

pub struct Subscriber<T: Message>{
    topic: Arc<Topic<T>>,
    last_seen_epoch: AtomicU64,
}

impl<T: Message> Subscriber<T>{
    pub fn new(topic: Arc<Topic<T>>) -> Self{
        Subscriber{
            topic,
            last_seen_epoch: AtomicU64::new(0),
        }
    }

    //true when a sample newer than the last copy() exists
    pub fn updated(&self) -> bool{
        let current = self.topic.latest_epoch();
        let last = self.last_seen_epoch.load(Ordering::SeqCst);
        current > last
    }

    //copy the latest sample and mark it seen
    pub fn copy(&self) -> Option<T>{
        let (value, epoch) = self.topic.latest()?;
        self.last_seen_epoch.store(epoch, Ordering::SeqCst);
        Some(value)
    }

    pub fn topic_name(&self) -> &str{
        self.topic.name()
    }

    pub fn topic(&self) -> &Arc<Topic<T>>{
        &self.topic
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::node::types::ActuatorArmed;

    #[test]
    fn test_subscriber_updated_and_copy(){
        let topic = Arc::new(Topic::<ActuatorArmed>::new("actuator_armed"));
        let subscriber = Subscriber::new(Arc::clone(&topic));

        assert!(!subscriber.updated());
        assert!(subscriber.copy().is_none());

        topic.publish(ActuatorArmed{ armed: true, lockdown: false });
        assert!(subscriber.updated());

        let armed = subscriber.copy().unwrap();
        assert!(armed.armed);
        assert!(!subscriber.updated());

        topic.publish(ActuatorArmed{ armed: true, lockdown: true });
        assert!(subscriber.updated());
    }

    #[test]
    fn test_subscribers_track_independently(){
        let topic = Arc::new(Topic::<i32>::new("/test"));
        let first = Subscriber::new(Arc::clone(&topic));
        let second = Subscriber::new(Arc::clone(&topic));

        topic.publish(10);
        assert_eq!(first.copy(), Some(10));
        assert!(!first.updated());
        assert!(second.updated());
        assert_eq!(second.topic_name(), "/test");
    }
}
