use std::collections::VecDeque;
use std::sync::Mutex;

//bounded mpmc mailbox with drop-oldest overflow
//both the transport loop and the driver hold &self across threads,
//so the interior lock replaces caller-side synchronization
pub struct MailQueue<T>{
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> MailQueue<T>{
    pub fn new(capacity: usize) -> Self{
        assert!(capacity > 0, "capacity must be greater than 0");

        MailQueue{
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    //push item, never blocks
    //on overflow the oldest entry is evicted and handed back (never the newest)
    pub fn push(&self, item: T) -> Option<T>{
        let mut queue = self.inner.lock().unwrap();

        let evicted = if queue.len() == self.capacity{
            queue.pop_front()
        }else{
            None
        };

        queue.push_back(item);
        return evicted;
    }

    //pop the oldest entry, never blocks
    pub fn pop(&self) -> Option<T>{
        return self.inner.lock().unwrap().pop_front();
    }

    //atomically take everything in arrival order, never blocks
    pub fn drain(&self) -> Vec<T>{
        return self.inner.lock().unwrap().drain(..).collect();
    }

    pub fn len(&self) -> usize{
        return self.inner.lock().unwrap().len();
    }

    pub fn is_empty(&self) -> bool{
        return self.inner.lock().unwrap().is_empty();
    }

    pub fn capacity(&self) -> usize{
        return self.capacity;
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_pop_fifo(){
        let q: MailQueue<i32> = MailQueue::new(5);

        q.push(10);
        q.push(20);
        q.push(30);

        assert_eq!(q.pop(), Some(10));
        assert_eq!(q.pop(), Some(20));
        assert_eq!(q.pop(), Some(30));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_overflow_discards_oldest(){
        //11 pushes into capacity 10 -> the 10 most recent remain, order kept
        let q: MailQueue<i32> = MailQueue::new(10);

        for i in 0..11{
            q.push(i);
        }

        assert_eq!(q.len(), 10);
        assert_eq!(q.drain(), (1..11).collect::<Vec<i32>>());
    }

    #[test]
    fn test_push_returns_evicted(){
        let q: MailQueue<i32> = MailQueue::new(2);

        assert_eq!(q.push(1), None);
        assert_eq!(q.push(2), None);
        assert_eq!(q.push(3), Some(1));
    }

    #[test]
    fn test_drain_order_and_empty_redrain(){
        let q: MailQueue<&str> = MailQueue::new(10);

        q.push("a");
        q.push("b");
        q.push("c");

        assert_eq!(q.drain(), vec!["a", "b", "c"]);
        //nothing new arrived -> second drain is empty
        assert!(q.drain().is_empty());
    }

    #[test]
    fn test_capacity_fully_usable(){
        let q: MailQueue<i32> = MailQueue::new(3);

        q.push(1);
        q.push(2);
        q.push(3);

        assert_eq!(q.len(), 3);
        assert_eq!(q.capacity(), 3);
    }

    #[test]
    fn test_concurrent_producers(){
        let q: Arc<MailQueue<i32>> = Arc::new(MailQueue::new(1000));

        let mut handles = Vec::new();
        for t in 0..4{
            let producer = Arc::clone(&q);
            handles.push(thread::spawn(move ||{
                for i in 0..100{
                    producer.push(t * 100 + i);
                }
            }));
        }

        for handle in handles{
            handle.join().unwrap();
        }

        let mut items = q.drain();
        assert_eq!(items.len(), 400);

        //every producer's items keep their relative order
        items.sort();
        assert_eq!(items, (0..400).collect::<Vec<i32>>());
    }
}
