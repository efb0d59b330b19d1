use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

//wakes pollers when any topic sharing this notifier is published
pub struct Notifier{
    generation: Mutex<u64>,
    cond: Condvar,
}

impl Notifier{
    pub fn new() -> Self{
        Notifier{
            generation: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, u64>{
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    //called by a topic after its new sample is visible
    pub fn notify(&self){
        let mut generation = self.lock();
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
    }

    pub fn generation(&self) -> u64{
        *self.lock()
    }

    //block until `ready` returns true or the timeout elapses
    //ready is evaluated under the notifier lock so a publish between the
    //check and the wait can't be missed
    pub fn wait_until<F: FnMut() -> bool>(&self, timeout: Duration, mut ready: F) -> bool{
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();

        loop{
            if ready(){
                return true;
            }

            let now = Instant::now();
            if now >= deadline{
                return false;
            }

            guard = match self.cond.wait_timeout(guard, deadline - now){
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl Default for Notifier{
    fn default() -> Self{
        Self::new()
    }
}
