//! Guest standard streams. Output normally goes straight to the host's
//! stdout/stderr; tests can swap in a capture buffer.

use std::{
    io::Write,
    sync::{Arc, LazyLock},
};

use parking_lot::{Mutex, RwLock};

/// Heap ids of the `System.out` / `System.err` stream objects.
static STREAM_IDS: LazyLock<RwLock<(u32, u32)>> = LazyLock::new(|| RwLock::new((0, 0)));

static CAPTURE: LazyLock<RwLock<Option<Arc<Mutex<String>>>>> =
    LazyLock::new(|| RwLock::new(None));

pub(crate) fn bind_streams(out_id: u32, err_id: u32) {
    *STREAM_IDS.write() = (out_id, err_id);
}

pub fn is_err_stream(id: u32) -> bool {
    STREAM_IDS.read().1 == id
}

/// Redirects all guest stdout into `buffer` until `release_capture`.
pub fn capture_into(buffer: Arc<Mutex<String>>) {
    *CAPTURE.write() = Some(buffer);
}

pub fn release_capture() {
    *CAPTURE.write() = None;
}

pub fn write_out(text: &str) {
    let capture = CAPTURE.read().clone();
    match capture {
        Some(buffer) => buffer.lock().push_str(text),
        None => {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }
}

pub fn write_err(text: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(text.as_bytes());
    let _ = stderr.flush();
}
