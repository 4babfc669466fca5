//! # Chunk Worker Demo Entry Point
//!
//! Calls into the library's `run()` function, which generates a small area
//! around the origin on the worker thread and logs the results.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --release -- [config.json]
//! ```

fn main() {
    chunk_worker::run();
}
