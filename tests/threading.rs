//! Thread-mode delivery: main-thread marshalling, serial background
//! ordering, async fan-out, and the active-flag race defense.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use typebus::{
    event_type, subscriber_info, EventBus, Executor, MainLoopScheduler, MainThreadPoster,
    MainThreadSupport, Poster,
};

struct Job(u32);
event_type!(Job);

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for delivery");
        thread::sleep(Duration::from_millis(5));
    }
}

// ---- Test main loop ----

type Tick = Box<dyn FnOnce() + Send>;

struct MainLoop {
    main_id: ThreadId,
    tx: mpsc::Sender<Tick>,
}

fn spawn_main_loop() -> MainLoop {
    let (tx, rx) = mpsc::channel::<Tick>();
    let (ready_tx, ready_rx) = mpsc::channel();
    thread::spawn(move || {
        ready_tx.send(thread::current().id()).unwrap();
        while let Ok(tick) = rx.recv() {
            tick();
        }
    });
    MainLoop { main_id: ready_rx.recv().unwrap(), tx }
}

impl MainLoop {
    fn support(&self) -> Arc<LoopSupport> {
        Arc::new(LoopSupport { main_id: self.main_id, tx: self.tx.clone() })
    }

    fn run_on_main(&self, tick: impl FnOnce() + Send + 'static) {
        self.tx.send(Box::new(tick)).unwrap();
    }
}

struct LoopSupport {
    main_id: ThreadId,
    tx: mpsc::Sender<Tick>,
}

impl MainThreadSupport for LoopSupport {
    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_id
    }

    fn create_poster(&self, bus: &EventBus) -> Arc<dyn Poster> {
        MainThreadPoster::new(bus, Arc::new(LoopScheduler { tx: self.tx.clone() }))
    }
}

struct LoopScheduler {
    tx: mpsc::Sender<Tick>,
}

impl MainLoopScheduler for LoopScheduler {
    fn schedule(&self, tick: Tick) {
        let _ = self.tx.send(tick);
    }
}

// ---- Recorders ----

#[derive(Default)]
struct MainRecorder {
    threads: Mutex<Vec<ThreadId>>,
}
impl MainRecorder {
    fn on_job(&self, _event: &Job) {
        self.threads.lock().unwrap().push(thread::current().id());
    }
}
subscriber_info! {
    MainRecorder;
    #[handle(mode = Main)]
    on_job => Job;
}

#[derive(Default)]
struct MainOrderedRecorder {
    threads: Mutex<Vec<ThreadId>>,
}
impl MainOrderedRecorder {
    fn on_job(&self, _event: &Job) {
        self.threads.lock().unwrap().push(thread::current().id());
    }
}
subscriber_info! {
    MainOrderedRecorder;
    #[handle(mode = MainOrdered)]
    on_job => Job;
}

#[derive(Default)]
struct BackgroundRecorder {
    order: Mutex<Vec<u32>>,
    threads: Mutex<Vec<ThreadId>>,
}
impl BackgroundRecorder {
    fn on_job(&self, event: &Job) {
        self.order.lock().unwrap().push(event.0);
        self.threads.lock().unwrap().push(thread::current().id());
    }
}
subscriber_info! {
    BackgroundRecorder;
    #[handle(mode = Background)]
    on_job => Job;
}

#[derive(Default)]
struct AsyncCounter {
    count: AtomicUsize,
}
impl AsyncCounter {
    fn on_job(&self, _event: &Job) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
subscriber_info! {
    AsyncCounter;
    #[handle(mode = Async)]
    on_job => Job;
}

// ---- Main-thread delivery ----

#[test]
fn main_handler_is_marshalled_from_other_threads() {
    let main_loop = spawn_main_loop();
    let bus = EventBus::builder().main_thread_support(main_loop.support()).build();
    let recorder = Arc::new(MainRecorder::default());
    bus.register(Arc::clone(&recorder)).unwrap();

    bus.post(Job(1));

    wait_for(|| recorder.threads.lock().unwrap().len() == 1);
    assert_eq!(recorder.threads.lock().unwrap()[0], main_loop.main_id);
}

#[test]
fn main_handler_runs_inline_on_the_main_thread() {
    let main_loop = spawn_main_loop();
    let bus = EventBus::builder().main_thread_support(main_loop.support()).build();
    let recorder = Arc::new(MainRecorder::default());
    bus.register(Arc::clone(&recorder)).unwrap();

    let (result_tx, result_rx) = mpsc::channel();
    let posted_bus = bus.clone();
    let posted_recorder = Arc::clone(&recorder);
    main_loop.run_on_main(move || {
        posted_bus.post(Job(2));
        // Inline delivery completes before post returns.
        result_tx.send(posted_recorder.threads.lock().unwrap().len()).unwrap();
    });

    assert_eq!(result_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    assert_eq!(recorder.threads.lock().unwrap()[0], main_loop.main_id);
}

#[test]
fn main_ordered_is_queued_even_on_the_main_thread() {
    let main_loop = spawn_main_loop();
    let bus = EventBus::builder().main_thread_support(main_loop.support()).build();
    let recorder = Arc::new(MainOrderedRecorder::default());
    bus.register(Arc::clone(&recorder)).unwrap();

    let (result_tx, result_rx) = mpsc::channel();
    let posted_bus = bus.clone();
    let posted_recorder = Arc::clone(&recorder);
    main_loop.run_on_main(move || {
        posted_bus.post(Job(3));
        // Queued delivery has not happened yet inside this tick.
        result_tx.send(posted_recorder.threads.lock().unwrap().len()).unwrap();
    });

    assert_eq!(result_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
    wait_for(|| recorder.threads.lock().unwrap().len() == 1);
    assert_eq!(recorder.threads.lock().unwrap()[0], main_loop.main_id);
}

// ---- Background delivery ----

#[test]
fn background_runs_inline_when_already_off_the_main_thread() {
    let main_loop = spawn_main_loop();
    let bus = EventBus::builder().main_thread_support(main_loop.support()).build();
    let recorder = Arc::new(BackgroundRecorder::default());
    bus.register(Arc::clone(&recorder)).unwrap();

    // The test thread is not the loop thread, so delivery is inline and
    // synchronous.
    bus.post(Job(4));

    let threads = recorder.threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0], thread::current().id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_posts_from_main_are_serial_and_ordered() {
    let bus = EventBus::new();
    let recorder = Arc::new(BackgroundRecorder::default());
    bus.register(Arc::clone(&recorder)).unwrap();

    // Without main-thread support every thread counts as main, so both
    // posts take the serial background path.
    bus.post(Job(1));
    bus.post(Job(2));

    let deadline = Instant::now() + Duration::from_secs(5);
    while recorder.order.lock().unwrap().len() < 2 {
        assert!(Instant::now() < deadline, "timed out waiting for background drain");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(recorder.order.lock().unwrap().clone(), [1, 2]);
    let threads = recorder.threads.lock().unwrap();
    assert_eq!(threads[0], threads[1]);
    assert_ne!(threads[0], thread::current().id());
}

// ---- Async delivery ----

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_mode_delivers_every_post() {
    let bus = EventBus::new();
    let counter = Arc::new(AsyncCounter::default());
    bus.register(Arc::clone(&counter)).unwrap();

    for i in 0..8 {
        bus.post(Job(i));
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while counter.count.load(Ordering::SeqCst) < 8 {
        assert!(Instant::now() < deadline, "timed out waiting for async deliveries");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(counter.count.load(Ordering::SeqCst), 8);
}

// ---- Unregister vs. queued delivery ----

#[derive(Default)]
struct ManualExecutor {
    jobs: Mutex<Vec<Box<dyn FnOnce() + Send + 'static>>>,
}

impl ManualExecutor {
    fn run_all(&self) {
        let jobs: Vec<_> = std::mem::take(&mut *self.jobs.lock().unwrap());
        for job in jobs {
            job();
        }
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        self.jobs.lock().unwrap().push(job);
    }
}

#[test]
fn queued_delivery_is_skipped_after_unregister() {
    let executor = Arc::new(ManualExecutor::default());
    let bus = EventBus::builder().executor(Arc::clone(&executor) as Arc<dyn Executor>).build();
    let counter = Arc::new(AsyncCounter::default());

    bus.register(Arc::clone(&counter)).unwrap();
    bus.post(Job(1));
    bus.unregister(&counter);
    executor.run_all();
    assert_eq!(counter.count.load(Ordering::SeqCst), 0);

    // A fresh registration delivers again.
    bus.register(Arc::clone(&counter)).unwrap();
    bus.post(Job(2));
    executor.run_all();
    assert_eq!(counter.count.load(Ordering::SeqCst), 1);
}
