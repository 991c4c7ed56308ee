use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const INITIAL_COUNTER_VALUE: u64 = 1;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(DEFAULT_TICK_INTERVAL_MS);

/// Zero-argument callback fired after every tick.
pub type UpdateObserver = Arc<dyn Fn() + Send + Sync>;

struct CounterState {
    value: u64,
    observer: Option<UpdateObserver>,
    // 每次 start/stop 都會遞增；舊的計時器看到不同世代就退出
    generation: u64,
}

struct TimerHandle {
    generation: u64,
    task: JoinHandle<()>,
}

/// A counter advanced by one on a fixed-delay timer.
///
/// Each instance owns its value and its timer. The timer runs as a task on
/// the current tokio runtime, so `start()` must be called from within one.
pub struct CounterService {
    state: Arc<Mutex<CounterState>>,
    timer: Mutex<Option<TimerHandle>>,
    period: Duration,
}

impl CounterService {
    pub fn new(period: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CounterState {
                value: INITIAL_COUNTER_VALUE,
                observer: None,
                generation: 0,
            })),
            timer: Mutex::new(None),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Starts ticking. A running timer is replaced, which restarts the
    /// interval phase but keeps the value.
    pub fn start(&self) {
        let mut timer = lock(&self.timer);
        let generation = self.cancel_locked(&mut timer);

        let state = Arc::clone(&self.state);
        let period = self.period;
        let task = tokio::spawn(run_timer(state, period, generation));

        tracing::debug!("Counter timer started (period: {:?})", period);
        *timer = Some(TimerHandle { generation, task });
    }

    /// Cancels the timer. No tick increments the value after this returns.
    ///
    /// On a multi-threaded runtime a tick that already incremented may
    /// still be calling the observer, so one notification for that tick can
    /// arrive after `stop()` returns.
    pub fn stop(&self) {
        let mut timer = lock(&self.timer);
        if timer.is_some() {
            self.cancel_locked(&mut timer);
            tracing::debug!("Counter timer stopped at value {}", self.get_value());
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.timer).is_some()
    }

    pub fn get_value(&self) -> u64 {
        lock(&self.state).value
    }

    /// Registers the tick observer, dropping any previous one uncalled.
    pub fn set_update_observer<F>(&self, observer: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.state).observer = Some(Arc::new(observer));
    }

    pub fn clear_update_observer(&self) {
        lock(&self.state).observer = None;
    }

    /// 取消現有計時器並回傳下一個世代編號
    fn cancel_locked(&self, timer: &mut Option<TimerHandle>) -> u64 {
        let mut state = lock(&self.state);
        state.generation += 1;
        if let Some(handle) = timer.take() {
            debug_assert!(handle.generation < state.generation);
            handle.task.abort();
        }
        state.generation
    }
}

impl Default for CounterService {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl Drop for CounterService {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.task.abort();
        }
    }
}

async fn run_timer(state: Arc<Mutex<CounterState>>, period: Duration, generation: u64) {
    loop {
        tokio::time::sleep(period).await;

        let (value, observer) = {
            let mut state = lock(&state);
            if state.generation != generation {
                return;
            }
            state.value += 1;
            (state.value, state.observer.clone())
        };

        tracing::trace!("Counter tick -> {}", value);

        // 鎖已釋放，觀察者可以呼叫 get_value()
        if let Some(observer) = observer {
            observer();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
