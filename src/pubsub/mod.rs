pub mod message;
pub mod notify;
pub mod topic;
pub mod publisher;
pub mod subscriber;
pub mod registry;

pub use message::Message;
pub use notify::Notifier;
pub use topic::Topic;
pub use publisher::Publisher;
pub use subscriber::Subscriber;
pub use registry::TopicRegistry;

#[cfg(test)]
mod tests{
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_pubsub_threaded_wakeup(){
        let registry = Arc::new(TopicRegistry::new());
        let subscriber = registry.subscribe::<u32>("/threaded");

        let pub_registry = Arc::clone(&registry);
        let producer = thread::spawn(move ||{
            let publisher = pub_registry.advertise::<u32>("/threaded");
            for i in 1..=100{
                publisher.publish(i);
            }
        });

        //wait until the final sample is visible
        let done = registry.notifier().wait_until(Duration::from_secs(5), ||{
            subscriber.topic().latest_epoch() == 100
        });
        producer.join().unwrap();

        assert!(done);
        assert_eq!(subscriber.copy(), Some(100));
    }
}
