// BufferPool - lock-free window pool with dual SPSC queues
//
// Implements an object pool pattern using two lock-free SPSC (Single Producer Single Consumer)
// ring buffers. The capture callback never allocates: it fills windows taken
// from the pool and hands them to the analysis thread, which returns them.
//
// Architecture:
// - DATA_QUEUE: capture thread pushes filled windows, analysis thread consumes
// - POOL_QUEUE: analysis thread returns empty windows, capture thread recycles
//
// Window flow:
// 1. Capture thread pops an empty window from POOL_QUEUE
// 2. Capture thread fills it and stamps the stream frame of its first sample
// 3. Capture thread pushes the filled window to DATA_QUEUE
// 4. Analysis thread pops filled windows from DATA_QUEUE in arrival order
// 5. Analysis thread pushes the window back to POOL_QUEUE
//
// Only the analysis thread can pop DATA_QUEUE, so dropping stale windows
// under backlog happens there (see `AnalysisChannels::shed_backlog`).

use rtrb::{Consumer, Producer};

/// Configuration constants for buffer pool
pub const DEFAULT_BUFFER_COUNT: usize = 16;
pub const DEFAULT_WINDOW_SIZE: usize = 4096;

/// Pre-allocated block of mono samples plus its position in the stream
#[derive(Debug, Clone, PartialEq)]
pub struct AudioWindow {
    pub samples: Vec<f32>,
    /// Stream frame index of `samples[0]`
    pub start_frame: u64,
}

impl AudioWindow {
    pub fn new(window_size: usize) -> Self {
        Self {
            samples: vec![0.0_f32; window_size],
            start_frame: 0,
        }
    }
}

/// Capture-thread half: takes empty windows, publishes filled ones
pub struct CaptureChannels {
    pub data_producer: Producer<AudioWindow>,
    pub pool_consumer: Consumer<AudioWindow>,
}

/// Analysis-thread half: consumes filled windows, recycles them
pub struct AnalysisChannels {
    pub data_consumer: Consumer<AudioWindow>,
    pub pool_producer: Producer<AudioWindow>,
}

impl AnalysisChannels {
    /// Filled windows waiting to be analysed
    pub fn backlog(&self) -> usize {
        self.data_consumer.slots()
    }

    /// Occupancy of the data queue as a percentage
    pub fn occupancy_percent(&self) -> f32 {
        let capacity = self.data_consumer.buffer().capacity();
        if capacity == 0 {
            return 0.0;
        }
        self.backlog() as f32 / capacity as f32 * 100.0
    }

    /// Return a window to the pool
    pub fn recycle(&mut self, window: AudioWindow) {
        // The pool queue holds every buffer, so this cannot overflow
        let _ = self.pool_producer.push(window);
    }

    /// Drop the oldest windows until at most `max_backlog` remain queued
    ///
    /// Returns the number of windows dropped.
    pub fn shed_backlog(&mut self, max_backlog: usize) -> usize {
        let mut dropped = 0;
        while self.backlog() > max_backlog {
            match self.data_consumer.pop() {
                Ok(window) => {
                    self.recycle(window);
                    dropped += 1;
                }
                Err(_) => break,
            }
        }
        dropped
    }
}

/// Split buffer pool channels for producer/consumer separation
///
/// This struct is returned by BufferPool::new() and provides
/// ownership-based access to the dual-queue system.
pub struct BufferPoolChannels {
    /// Producer for sending filled windows to analysis thread
    pub data_producer: Producer<AudioWindow>,
    /// Consumer for receiving filled windows in analysis thread
    pub data_consumer: Consumer<AudioWindow>,
    /// Producer for returning empty windows from analysis thread
    pub pool_producer: Producer<AudioWindow>,
    /// Consumer for retrieving empty windows in capture thread
    pub pool_consumer: Consumer<AudioWindow>,
}

impl BufferPoolChannels {
    /// Hand each half to the thread that owns it
    pub fn split(self) -> (CaptureChannels, AnalysisChannels) {
        (
            CaptureChannels {
                data_producer: self.data_producer,
                pool_consumer: self.pool_consumer,
            },
            AnalysisChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

/// Lock-free window pool using dual SPSC ring buffers
///
/// Pre-allocates a fixed number of windows and manages them through
/// two lock-free queues. All heap allocations happen during initialization.
///
/// # Example
/// ```ignore
/// let (mut capture, mut analysis) = BufferPool::new(16, 4096).split();
///
/// // In capture thread:
/// if let Ok(window) = capture.pool_consumer.pop() {
///     // Fill window with audio data
///     capture.data_producer.push(window).ok();
/// }
///
/// // In analysis thread:
/// if let Ok(window) = analysis.data_consumer.pop() {
///     // Process window
///     analysis.recycle(window);
/// }
/// ```
pub struct BufferPool;

impl BufferPool {
    /// Create a new BufferPool with specified window count and size
    ///
    /// # Panics
    /// Panics if buffer_count is 0 or window_size is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, window_size: usize) -> BufferPoolChannels {
        assert!(buffer_count > 0, "buffer_count must be greater than 0");
        assert!(window_size > 0, "window_size must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        // Both queues have room for every window, so these pushes succeed
        for _ in 0..buffer_count {
            let _ = pool_producer.push(AudioWindow::new(window_size));
        }

        BufferPoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_creation() {
        let mut channels = BufferPool::new(16, 4096);

        let mut available = 0;
        while channels.pool_consumer.pop().is_ok() {
            available += 1;
        }
        assert_eq!(available, 16, "Expected 16 windows in pool queue");

        assert!(
            channels.data_consumer.pop().is_err(),
            "Data queue should be empty initially"
        );
    }

    #[test]
    fn test_window_size() {
        let mut channels = BufferPool::new(1, 2048);

        let window = channels
            .pool_consumer
            .pop()
            .expect("Should have one window in pool");
        assert_eq!(window.samples.len(), 2048, "Window should have correct size");
        assert_eq!(window.start_frame, 0);
    }

    #[test]
    fn test_window_circulation() {
        let (mut capture, mut analysis) = BufferPool::new(4, 1024).split();

        let mut window = capture.pool_consumer.pop().expect("Should have window in pool");
        window.samples[0] = 1.0;
        window.start_frame = 4096;
        capture
            .data_producer
            .push(window)
            .expect("Should push to data queue");

        let window = analysis
            .data_consumer
            .pop()
            .expect("Should have window in data queue");
        assert_eq!(window.samples[0], 1.0, "Window data should be preserved");
        assert_eq!(window.start_frame, 4096, "Frame stamp should be preserved");
        analysis.recycle(window);

        let window = capture
            .pool_consumer
            .pop()
            .expect("Window should be back in pool");
        assert_eq!(window.samples.len(), 1024, "Window size should be unchanged");
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CaptureChannels>();
        assert_send::<AnalysisChannels>();
        assert_send::<BufferPoolChannels>();
    }

    #[test]
    fn test_shed_backlog_drops_oldest() {
        let (mut capture, mut analysis) = BufferPool::new(8, 16).split();

        for i in 0..6u64 {
            let mut window = capture.pool_consumer.pop().unwrap();
            window.start_frame = i * 16;
            capture.data_producer.push(window).unwrap();
        }
        assert_eq!(analysis.backlog(), 6);
        assert!((analysis.occupancy_percent() - 75.0).abs() < f32::EPSILON);

        let dropped = analysis.shed_backlog(2);
        assert_eq!(dropped, 4);
        assert_eq!(analysis.backlog(), 2);

        // Newest windows survive, in order
        assert_eq!(analysis.data_consumer.pop().unwrap().start_frame, 64);
        assert_eq!(analysis.data_consumer.pop().unwrap().start_frame, 80);

        // Dropped windows went back to the pool
        let mut pooled = 0;
        while capture.pool_consumer.pop().is_ok() {
            pooled += 1;
        }
        assert_eq!(pooled, 6, "2 never used plus 4 shed");
    }

    #[test]
    fn test_shed_backlog_noop_under_limit() {
        let (mut capture, mut analysis) = BufferPool::new(4, 16).split();
        let window = capture.pool_consumer.pop().unwrap();
        capture.data_producer.push(window).unwrap();

        assert_eq!(analysis.shed_backlog(2), 0);
        assert_eq!(analysis.backlog(), 1);
    }

    #[test]
    #[should_panic(expected = "buffer_count must be greater than 0")]
    fn test_zero_buffer_count_panics() {
        BufferPool::new(0, 1024);
    }

    #[test]
    #[should_panic(expected = "window_size must be greater than 0")]
    fn test_zero_window_size_panics() {
        BufferPool::new(16, 0);
    }
}
