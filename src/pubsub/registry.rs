use std::sync::{Arc, PoisonError, RwLock};
use std::collections::HashMap;
use std::any::Any;
use super::topic::Topic;
use super::message::Message;
use super::notify::Notifier;
use super::publisher::Publisher;
use super::subscriber::Subscriber;

//named topics sharing one notifier, so a single poll can wait on any of them
pub struct TopicRegistry{
    topics: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    notifier: Arc<Notifier>,
}

impl TopicRegistry{
    pub fn new() -> Self{
        TopicRegistry{
            topics: RwLock::new(HashMap::new()),
            notifier: Arc::new(Notifier::new()),
        }
    }

    pub fn get_or_create<T: Message>(&self, name: &str) -> Arc<Topic<T>>{
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = topics.get(name){
            if let Ok(topic) = existing.clone().downcast::<Topic<T>>(){
                return topic;
            }
        }
        let topic = Arc::new(Topic::<T>::with_notifier(name, Arc::clone(&self.notifier)));
        topics.insert(name.to_string(), topic.clone() as Arc<dyn Any + Send + Sync>);
        topic
    }

    pub fn advertise<T: Message>(&self, name: &str) -> Publisher<T>{
        Publisher::new(self.get_or_create(name))
    }

    pub fn subscribe<T: Message>(&self, name: &str) -> Subscriber<T>{
        Subscriber::new(self.get_or_create(name))
    }

    pub fn notifier(&self) -> &Arc<Notifier>{
        &self.notifier
    }

    pub fn topic_count(&self) -> usize{
        self.topics.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for TopicRegistry{
    fn default() -> Self{
        Self::new()
    }
}
