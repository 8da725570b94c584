// Every task owns one pipe. Each round it drains its own pipe, then sends one
// record to every other pipe. Readers check sequence numbers and digests.
//
// Usage: fifo_stress [--seconds N] [--tasks N] [--streams]
use rtos_fifo::Stream::{StreamId, StreamOptions, StreamTable};
use rtos_fifo::Task::{logging, TaskRuntime};
use rtos_fifo::FIFO::{FifoBuilder, RingBuffer};
use sha2::{Digest, Sha256};
use std::env;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const RECORD: usize = 0x100;
const DIGEST_LEN: usize = 16;
const BODY: usize = RECORD - DIGEST_LEN;
/// Records each pipe can hold per peer.
const DEPTH: usize = 20;

#[derive(Default)]
struct PipeStats {
    reads: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
    missed: AtomicU64,
    rejected: AtomicU64,
}

enum Pipes {
    Fifo(Vec<RingBuffer>),
    Streams(StreamTable),
}

impl Pipes {
    fn read(&self, i: usize, buf: &mut [u8]) -> usize {
        match self {
            Pipes::Fifo(fifos) => fifos[i].extract(buf) as usize,
            Pipes::Streams(table) => StreamId::new(i)
                .and_then(|id| table.read(id, buf).ok())
                .unwrap_or(0),
        }
    }

    fn write(&self, i: usize, buf: &[u8]) -> usize {
        match self {
            Pipes::Fifo(fifos) => fifos[i].insert(buf) as usize,
            Pipes::Streams(table) => StreamId::new(i)
                .and_then(|id| table.write(id, buf).ok())
                .unwrap_or(0),
        }
    }
}

struct Config {
    seconds: Option<u64>,
    tasks: usize,
    streams: bool,
}

fn parse_args() -> io::Result<Config> {
    let mut config = Config {
        seconds: None,
        tasks: 9,
        streams: false,
    };
    let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidInput, msg);
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seconds" => {
                let v = args.next().ok_or_else(|| invalid("--seconds needs a value".into()))?;
                config.seconds = Some(v.parse().map_err(|e| invalid(format!("--seconds {v}: {e}")))?);
            }
            "--tasks" => {
                let v = args.next().ok_or_else(|| invalid("--tasks needs a value".into()))?;
                config.tasks = v.parse().map_err(|e| invalid(format!("--tasks {v}: {e}")))?;
            }
            "--streams" => config.streams = true,
            other => {
                return Err(invalid(format!(
                    "unknown argument {other}; usage: fifo_stress [--seconds N] [--tasks N] [--streams]"
                )))
            }
        }
    }
    if !(2..=rtos_fifo::Stream::MAX_STREAMS).contains(&config.tasks) {
        return Err(invalid(format!("--tasks must be in 2..={}", rtos_fifo::Stream::MAX_STREAMS)));
    }
    Ok(config)
}

fn digest(body: &[u8]) -> [u8; DIGEST_LEN] {
    let full = Sha256::digest(body);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&full[..DIGEST_LEN]);
    out
}

fn encode(buf: &mut [u8; RECORD], from: usize, to: usize, seq: u64) {
    buf[0..4].copy_from_slice(&(from as u32).to_le_bytes());
    buf[4..8].copy_from_slice(&(to as u32).to_le_bytes());
    buf[8..16].copy_from_slice(&seq.to_le_bytes());
    for (k, b) in buf[16..BODY].iter_mut().enumerate() {
        *b = (seq as usize + k) as u8;
    }
    let d = digest(&buf[..BODY]);
    buf[BODY..].copy_from_slice(&d);
}

/// Check one received record against the last sequence seen per sender.
fn check(stats: &PipeStats, buf: &[u8], prev_seq: &mut [u64]) {
    stats.reads.fetch_add(1, Ordering::Relaxed);
    if digest(&buf[..BODY])[..] != buf[BODY..] {
        stats.errors.fetch_add(1, Ordering::Relaxed);
        return;
    }
    let from = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let mut seq_bytes = [0u8; 8];
    seq_bytes.copy_from_slice(&buf[8..16]);
    let seq = u64::from_le_bytes(seq_bytes);
    let Some(prev) = prev_seq.get_mut(from) else {
        stats.errors.fetch_add(1, Ordering::Relaxed);
        return;
    };
    if *prev != 0 && seq != *prev + 1 {
        stats.missed.fetch_add(1, Ordering::Relaxed);
    }
    *prev = seq;
}

fn pipe_task(me: usize, pipes: Arc<Pipes>, stats: Arc<Vec<PipeStats>>, running: Arc<AtomicBool>) {
    let n = stats.len();
    let mut prev_seq = vec![0u64; n];
    let mut write_seq = vec![0u64; n];
    let mut buf = [0u8; RECORD];

    while running.load(Ordering::Relaxed) {
        for to in 0..n {
            while pipes.read(me, &mut buf) == RECORD {
                check(&stats[me], &buf, &mut prev_seq);
            }
            if to == me {
                continue;
            }
            write_seq[to] += 1;
            encode(&mut buf, me, to, write_seq[to]);
            if pipes.write(to, &buf) != RECORD {
                stats[to].rejected.fetch_add(1, Ordering::Relaxed);
            }
            stats[to].writes.fetch_add(1, Ordering::Relaxed);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn report(stats: &[PipeStats]) {
    info!(tick_ms = logging::msec_clock(), "##        reads       writes   errors   missed   wr_ovr");
    for (i, s) in stats.iter().enumerate() {
        info!(
            "{:2} {:12} {:12} {:8} {:8} {:8}",
            i,
            s.reads.load(Ordering::Relaxed),
            s.writes.load(Ordering::Relaxed),
            s.errors.load(Ordering::Relaxed),
            s.missed.load(Ordering::Relaxed),
            s.rejected.load(Ordering::Relaxed)
        );
    }
}

fn main() -> io::Result<()> {
    logging::init();
    let config = parse_args()?;
    let n = config.tasks;
    let capacity = (RECORD * DEPTH * n) as u32;

    let pipes = if config.streams {
        let table = StreamTable::new(capacity as usize * n)?;
        for i in 0..n {
            let id = StreamId::new(i)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "stream id out of range"))?;
            table
                .open(id, StreamOptions::new(RECORD as u32, (DEPTH * n) as u32).non_blocking())
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Pipes::Streams(table)
    } else {
        let fifos = (0..n)
            .map(|i| FifoBuilder::new().with_capacity(capacity).with_id(i as u16).build())
            .collect::<io::Result<Vec<_>>>()?;
        Pipes::Fifo(fifos)
    };
    let pipes = Arc::new(pipes);
    let stats: Arc<Vec<PipeStats>> = Arc::new((0..n).map(|_| PipeStats::default()).collect());
    let running = Arc::new(AtomicBool::new(true));

    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    info!(tasks = n, capacity, streams = config.streams, "start");
    let runtime = TaskRuntime::new();
    let mut handles = Vec::with_capacity(n);
    for i in 0..n {
        let pipes = Arc::clone(&pipes);
        let stats = Arc::clone(&stats);
        let running = Arc::clone(&running);
        handles.push(runtime.spawn(&format!("task#{}", i + 1), 7 + i as i32, move || {
            pipe_task(i, pipes, stats, running)
        })?);
    }
    runtime.start();

    let began = Instant::now();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_secs(1));
        report(&stats);
        if config.seconds.is_some_and(|s| began.elapsed() >= Duration::from_secs(s)) {
            running.store(false, Ordering::SeqCst);
        }
    }

    for handle in handles {
        let name = handle.name().to_string();
        if handle.join().is_err() {
            tracing::error!(task = %name, "task panicked");
        }
    }
    report(&stats);
    let errors: u64 = stats.iter().map(|s| s.errors.load(Ordering::Relaxed)).sum();
    info!(errors, elapsed = ?began.elapsed(), "done");
    Ok(())
}
