use std::sync::atomic::{AtomicU64, Ordering};

use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления lifecycle логирования.
///
/// Держит guard файлового writer: пока handle жив, записи в файл
/// сбрасываются фоновым потоком.
#[derive(Debug)]
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    flush_count: AtomicU64,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            flush_count: AtomicU64::new(0),
        }
    }

    /// Включён ли вывод в файл.
    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Фиксирует запрос на flush. Сам сброс выполняет `WorkerGuard` при
    /// уничтожении.
    pub fn flush(&self) {
        let count = self.flush_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(flush_count = count, "Logging flush requested");
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::Relaxed)
    }

    /// Завершает логирование, дожидаясь записи буфера в файл.
    pub fn shutdown(mut self) {
        tracing::info!(
            flushes = self.flush_count(),
            file_sink = self.has_file_sink(),
            "Logging shutdown"
        );
        drop(self.file_guard.take());
    }
}
