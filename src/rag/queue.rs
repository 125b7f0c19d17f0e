//! Bounded, strictly-ordered priority queue for RAG sub-requests.
//!
//! Dequeue order is `(priority desc, enqueued_at asc)`. Capacity is
//! enforced before any lock is taken, so a full queue returns
//! `backpressure` without contending with in-progress dequeues.

mod private
{
  use crate::error::{ ClaudetteError, Result };
  use parking_lot::Mutex;
  use std::cmp::Ordering;
  use std::collections::BinaryHeap;
  use std::sync::atomic::{ AtomicUsize, Ordering as AtomicOrdering };
  use tokio::sync::Notify;

  /// One request waiting for a RAG worker.
  #[ derive( Debug, Clone ) ]
  pub struct QueuedRequest
  {
    /// The prompt text to enrich.
    pub payload : String,
    /// 0..9, higher is more urgent.
    pub priority : u8,
    /// Monotonic sequence number standing in for wall-clock enqueue time;
    /// strictly increasing, which is all the ordering contract needs.
    pub enqueued_seq : u64,
  }

  impl PartialEq for QueuedRequest
  {
    fn eq( &self, other : &Self ) -> bool
    {
      self.priority == other.priority && self.enqueued_seq == other.enqueued_seq
    }
  }
  impl Eq for QueuedRequest {}

  impl PartialOrd for QueuedRequest
  {
    fn partial_cmp( &self, other : &Self ) -> Option< Ordering >
    {
      Some( self.cmp( other ) )
    }
  }

  impl Ord for QueuedRequest
  {
    /// `BinaryHeap` is a max-heap; `(priority desc, enqueued_at asc)` means
    /// higher priority sorts first, and for equal priority the
    /// *earlier*-enqueued item must sort first, hence `Reverse` on the seq.
    fn cmp( &self, other : &Self ) -> Ordering
    {
      self.priority.cmp( &other.priority )
        .then_with( | | other.enqueued_seq.cmp( &self.enqueued_seq ) )
    }
  }

  /// The bounded priority queue.
  pub struct PriorityQueue
  {
    heap : Mutex< BinaryHeap< QueuedRequest > >,
    max_size : usize,
    per_priority_cap : usize,
    next_seq : AtomicUsize,
    notify : Notify,
  }

  impl PriorityQueue
  {
    /// Builds a queue bounded by total size and a per-priority-class cap.
    #[ must_use ]
    pub fn new( max_size : usize, per_priority_cap : usize ) -> Self
    {
      Self { heap : Mutex::new( BinaryHeap::new() ), max_size, per_priority_cap, next_seq : AtomicUsize::new( 0 ), notify : Notify::new() }
    }

    /// Attempts to enqueue. Fails fast with [`ClaudetteError::Backpressure`]
    /// if the queue (or the request's priority class) is at capacity —
    /// never blocks.
    pub fn try_enqueue( &self, payload : String, priority : u8 ) -> Result< () >
    {
      let mut heap = self.heap.lock();
      if heap.len() >= self.max_size
      {
        return Err( ClaudetteError::Backpressure );
      }
      let same_priority_count = heap.iter().filter( | item | item.priority == priority ).count();
      if same_priority_count >= self.per_priority_cap
      {
        return Err( ClaudetteError::Backpressure );
      }

      let seq = self.next_seq.fetch_add( 1, AtomicOrdering::SeqCst ) as u64;
      heap.push( QueuedRequest { payload, priority, enqueued_seq : seq } );
      drop( heap );
      self.notify.notify_one();
      Ok( () )
    }

    /// Pops the highest-priority, earliest-enqueued item, if any.
    #[ must_use ]
    pub fn try_dequeue( &self ) -> Option< QueuedRequest >
    {
      self.heap.lock().pop()
    }

    /// Waits until an item is available, then pops it.
    pub async fn dequeue( &self ) -> QueuedRequest
    {
      loop
      {
        if let Some( item ) = self.try_dequeue()
        {
          return item;
        }
        self.notify.notified().await;
      }
    }

    /// Current queue length.
    #[ must_use ]
    pub fn len( &self ) -> usize
    {
      self.heap.lock().len()
    }

    /// Whether the queue currently holds nothing.
    #[ must_use ]
    pub fn is_empty( &self ) -> bool
    {
      self.len() == 0
    }
  }

} // end mod private

pub use private::{ PriorityQueue, QueuedRequest };

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn dequeues_higher_priority_first()
  {
    let queue = PriorityQueue::new( 10, 10 );
    queue.try_enqueue( "low".into(), 1 ).unwrap();
    queue.try_enqueue( "high".into(), 9 ).unwrap();
    let first = queue.try_dequeue().unwrap();
    assert_eq!( first.payload, "high" );
  }

  #[ test ]
  fn fifo_within_same_priority()
  {
    let queue = PriorityQueue::new( 10, 10 );
    queue.try_enqueue( "first".into(), 5 ).unwrap();
    queue.try_enqueue( "second".into(), 5 ).unwrap();
    assert_eq!( queue.try_dequeue().unwrap().payload, "first" );
    assert_eq!( queue.try_dequeue().unwrap().payload, "second" );
  }

  #[ test ]
  fn full_queue_rejects_with_backpressure()
  {
    let queue = PriorityQueue::new( 2, 10 );
    queue.try_enqueue( "a".into(), 1 ).unwrap();
    queue.try_enqueue( "b".into(), 1 ).unwrap();
    let err = queue.try_enqueue( "c".into(), 1 ).unwrap_err();
    assert_eq!( err.kind(), "backpressure" );
  }

  #[ test ]
  fn per_priority_cap_enforced_independently_of_total_capacity()
  {
    let queue = PriorityQueue::new( 10, 1 );
    queue.try_enqueue( "a".into(), 5 ).unwrap();
    let err = queue.try_enqueue( "b".into(), 5 ).unwrap_err();
    assert_eq!( err.kind(), "backpressure" );
    // a different priority class still has room
    queue.try_enqueue( "c".into(), 6 ).unwrap();
  }

  #[ test ]
  fn ordering_property_holds_across_many_items()
  {
    let queue = PriorityQueue::new( 100, 100 );
    for i in 0..20
    {
      queue.try_enqueue( format!( "item-{i}" ), ( i % 4 ) as u8 ).unwrap();
    }
    let mut last : Option< QueuedRequest > = None;
    while let Some( item ) = queue.try_dequeue()
    {
      if let Some( prev ) = &last
      {
        assert!( ( prev.priority, std::cmp::Reverse( prev.enqueued_seq ) ) >= ( item.priority, std::cmp::Reverse( item.enqueued_seq ) ) );
      }
      last = Some( item );
    }
  }
}
