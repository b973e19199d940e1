use anyhow::Result;

/// The daemon handles every event on one thread; handlers never run concurrently.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
