//! Writes metric records from one thread while another tails the same file.
//!
//! ```text
//! cargo run -p runlog-store --example tail
//! ```

use runlog_store::{LogOptions, Reader, ScanState, Writer};
use std::thread;
use std::time::Duration;
use tracing::info;

const RECORDS: usize = 50;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let dir = std::env::temp_dir().join(format!("runlog-tail-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("run-demo.db");
    let options = LogOptions::default();

    let mut writer = Writer::open_for_write(&path, &options)?;
    let producer = thread::spawn(move || -> anyhow::Result<()> {
        for step in 0..RECORDS {
            let line = format!("step={} loss={:.4}", step, 1.0 / (step as f64 + 1.0));
            let result = writer.write(line.as_bytes())?;
            info!(step, offset = result.offset_before, "wrote");
            thread::sleep(Duration::from_millis(20));
        }
        writer.close()?;
        Ok(())
    });

    let mut reader = Reader::open_for_scan(&path, &options)?;
    let mut seen = 0;
    while seen < RECORDS {
        match reader.scan_record()? {
            Some(record) => {
                seen += 1;
                info!(payload = %String::from_utf8_lossy(&record.data), "tailed");
            }
            None => {
                // Either caught up or the writer is mid-record
                debug_assert!(reader.state() != ScanState::Corrupt);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    producer
        .join()
        .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
    std::fs::remove_dir_all(&dir)?;
    info!(records = seen, "done");
    Ok(())
}
