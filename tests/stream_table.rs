// Stream multiplexer tests
// Run with: cargo test --test stream_table -- --nocapture

use rtos_fifo::Stream::{
    IoCommand, StreamError, StreamId, StreamOptions, StreamTable, WriteHandler, MAX_STREAMS,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn id(raw: usize) -> StreamId {
    StreamId::new(raw).unwrap()
}

fn table() -> StreamTable {
    StreamTable::new(64 * 1024).unwrap()
}

#[test]
fn open_probe_and_close() {
    let t = table();
    assert!(!t.is_open(id(3)));
    t.open(id(3), StreamOptions::new(4, 8)).unwrap();
    assert!(t.is_open(id(3)));
    assert_eq!(t.open_count(), 1);
    assert!(matches!(
        t.open(id(3), StreamOptions::new(4, 8)),
        Err(StreamError::AlreadyOpen(_))
    ));

    t.close(id(3)).unwrap();
    assert!(!t.is_open(id(3)));
    assert!(matches!(t.close(id(3)), Err(StreamError::NotOpen(_))));
    assert!(matches!(t.write(id(3), b"abcd"), Err(StreamError::NotOpen(_))));

    // slot is reusable; arena bytes are not reclaimed
    let used = t.arena_used();
    t.open(id(3), StreamOptions::new(4, 8)).unwrap();
    assert_eq!(t.arena_used(), used + 32);
}

#[test]
fn invalid_options_are_refused() {
    let t = table();
    assert!(matches!(
        t.open(id(0), StreamOptions::new(0, 8)),
        Err(StreamError::InvalidArgument(_))
    ));
    assert!(matches!(
        t.open(id(0), StreamOptions::new(1 << 20, 1 << 20)),
        Err(StreamError::InvalidArgument(_))
    ));
    assert!(matches!(
        t.open(id(0), StreamOptions::new(1024, 1024)),
        Err(StreamError::OutOfMemory { .. })
    ));
    assert!(StreamId::new(MAX_STREAMS).is_none());
    assert!(StreamId::try_from(-5).is_err());
}

#[test]
fn non_blocking_stream_drops_when_full() {
    let t = table();
    t.open(id(1), StreamOptions::new(4, 2).non_blocking()).unwrap();
    assert_eq!(t.write(id(1), b"aaaa").unwrap(), 4);
    assert_eq!(t.write(id(1), b"bbbb").unwrap(), 4);
    assert_eq!(t.write(id(1), b"cccc").unwrap(), 0);

    let mut buf = [0u8; 8];
    assert_eq!(t.read(id(1), &mut buf).unwrap(), 8);
    assert_eq!(&buf, b"aaaabbbb");
    assert_eq!(t.read(id(1), &mut buf).unwrap(), 0);
    assert_eq!(t.stats(id(1)).unwrap().overflow_count, 1);
}

#[test]
fn overwrite_stream_keeps_newest() {
    let t = table();
    t.open(id(2), StreamOptions::new(2, 3).overwrite().non_blocking())
        .unwrap();
    for chunk in [b"11", b"22", b"33", b"44"] {
        assert_eq!(t.write(id(2), chunk).unwrap(), 2);
    }
    let mut buf = [0u8; 6];
    assert_eq!(t.read(id(2), &mut buf).unwrap(), 6);
    assert_eq!(&buf, b"223344");
}

#[test]
fn box_stream_reads_latest_element() {
    let t = table();
    t.open(id(4), StreamOptions::new(4, 10).boxed()).unwrap();
    assert_eq!(t.ioctl(id(4), IoCommand::ElementSize).unwrap(), 4);
    assert!(matches!(
        t.write(id(4), b"toolong"),
        Err(StreamError::InvalidArgument(_))
    ));
    t.write(id(4), b"v001").unwrap();
    t.write(id(4), b"v002").unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(t.read(id(4), &mut buf).unwrap(), 4);
    assert_eq!(&buf, b"v002");
    assert_eq!(t.read(id(4), &mut buf).unwrap(), 4);
    assert_eq!(&buf, b"v002");
}

#[test]
fn blocking_read_waits_for_whole_request() {
    let t = Arc::new(table());
    t.open(id(5), StreamOptions::new(4, 16)).unwrap();

    let writer = {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            for chunk in [b"ab", b"cd", b"ef", b"gh"] {
                thread::sleep(Duration::from_millis(5));
                t.write(id(5), chunk).unwrap();
            }
        })
    };

    let mut buf = [0u8; 8];
    assert_eq!(t.read(id(5), &mut buf).unwrap(), 8);
    assert_eq!(&buf, b"abcdefgh");
    writer.join().unwrap();
}

#[test]
fn byte_stream_read_returns_early() {
    let t = Arc::new(table());
    t.open(id(6), StreamOptions::new(1, 64)).unwrap();
    let writer = {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            t.write(id(6), b"xyz").unwrap();
        })
    };
    let mut buf = [0u8; 32];
    let n = t.read(id(6), &mut buf).unwrap();
    assert!(n >= 1 && n <= 3);
    assert_eq!(&buf[..n], &b"xyz"[..n]);
    writer.join().unwrap();
}

#[test]
fn read_timeout_expires() {
    let t = table();
    t.open(id(7), StreamOptions::new(4, 4)).unwrap();
    let mut buf = [0u8; 4];
    let start = Instant::now();
    assert!(matches!(
        t.read_timeout(id(7), &mut buf, Duration::from_millis(30)),
        Err(StreamError::Timeout)
    ));
    assert!(start.elapsed() >= Duration::from_millis(30));

    let mut huge = [0u8; 17];
    assert!(matches!(
        t.read(id(7), &mut huge),
        Err(StreamError::TooLarge { .. })
    ));
}

#[test]
fn blocking_write_waits_for_room() {
    let t = Arc::new(table());
    t.open(id(8), StreamOptions::new(4, 2)).unwrap();
    t.write(id(8), b"1111").unwrap();
    t.write(id(8), b"2222").unwrap();

    let writer = {
        let t = Arc::clone(&t);
        thread::spawn(move || t.write(id(8), b"3333").unwrap())
    };
    thread::sleep(Duration::from_millis(20));
    assert!(!writer.is_finished());

    let mut buf = [0u8; 4];
    assert_eq!(t.read(id(8), &mut buf).unwrap(), 4);
    assert_eq!(writer.join().unwrap(), 4);

    let mut rest = [0u8; 8];
    assert_eq!(t.read(id(8), &mut rest).unwrap(), 8);
    assert_eq!(&rest, b"22223333");
    assert!(matches!(
        t.write(id(8), &[0; 9]),
        Err(StreamError::TooLarge { .. })
    ));
}

#[test]
fn close_wakes_blocked_reader() {
    let t = Arc::new(table());
    t.open(id(9), StreamOptions::new(4, 4)).unwrap();
    let reader = {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            let mut buf = [0u8; 4];
            t.read(id(9), &mut buf)
        })
    };
    thread::sleep(Duration::from_millis(20));
    t.close(id(9)).unwrap();
    assert!(matches!(
        reader.join().unwrap(),
        Err(StreamError::NotOpen(_))
    ));
}

#[test]
fn close_wakes_blocked_select() {
    let t = Arc::new(table());
    t.open(id(14), StreamOptions::new(4, 4)).unwrap();
    t.open(id(15), StreamOptions::new(4, 4)).unwrap();
    let selector = {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            let start = Instant::now();
            let result = t.select(&[id(14), id(15)], Some(Duration::from_secs(5)));
            (result, start.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(20));
    t.close(id(14)).unwrap();
    thread::sleep(Duration::from_millis(30));
    // one stream still open: keep waiting
    assert!(!selector.is_finished());

    t.close(id(15)).unwrap();
    let (result, waited) = selector.join().unwrap();
    assert!(matches!(result, Err(StreamError::NotOpen(_))));
    assert!(waited < Duration::from_secs(2), "select waited {waited:?}");
}

#[test]
fn select_without_timeout_returns_when_streams_close() {
    let t = Arc::new(table());
    t.open(id(16), StreamOptions::new(4, 4)).unwrap();
    let selector = {
        let t = Arc::clone(&t);
        thread::spawn(move || t.select(&[id(16)], None))
    };
    thread::sleep(Duration::from_millis(20));
    t.close(id(16)).unwrap();
    assert!(matches!(
        selector.join().unwrap(),
        Err(StreamError::NotOpen(_))
    ));
}

#[test]
fn select_reports_first_ready_stream() {
    let t = Arc::new(table());
    for raw in 10..13 {
        t.open(id(raw), StreamOptions::new(4, 4)).unwrap();
    }
    let ids = [id(10), id(11), id(12), id(50)];

    assert!(matches!(
        t.select(&ids, Some(Duration::from_millis(10))),
        Err(StreamError::Timeout)
    ));

    let writer = {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            t.write(id(12), b"ping").unwrap();
        })
    };
    assert_eq!(t.select(&ids, Some(Duration::from_secs(5))).unwrap(), 2);
    writer.join().unwrap();

    // already ready: returns without waiting
    t.write(id(11), b"pong").unwrap();
    assert_eq!(t.select(&ids, None).unwrap(), 1);

    assert!(matches!(
        t.select(&[id(50)], None),
        Err(StreamError::InvalidArgument(_))
    ));
}

#[test]
fn ioctl_reports_counts_and_resets() {
    let t = table();
    t.open(id(20), StreamOptions::new(8, 4).non_blocking())
        .unwrap();
    t.write(id(20), b"0123456789").unwrap();
    assert_eq!(t.ioctl(id(20), IoCommand::DataCount).unwrap(), 10);
    assert_eq!(t.ioctl(id(20), IoCommand::FreeSize).unwrap(), 22);
    assert_eq!(t.ioctl(id(20), IoCommand::ElementSize).unwrap(), 8);
    t.ioctl(id(20), IoCommand::Reset).unwrap();
    assert_eq!(t.ioctl(id(20), IoCommand::DataCount).unwrap(), 0);
    assert_eq!(t.ioctl(id(20), IoCommand::FreeSize).unwrap(), 32);
    assert!(matches!(
        t.ioctl(id(21), IoCommand::DataCount),
        Err(StreamError::NotOpen(_))
    ));
}

#[test]
fn write_handler_sees_every_accepted_write() {
    let t = table();
    t.open(id(30), StreamOptions::new(2, 2).non_blocking())
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler: WriteHandler = Arc::new(move |sid: StreamId| {
        assert_eq!(sid.index(), 30);
        counter.fetch_add(1, Ordering::SeqCst);
    });
    t.set_handler(id(30), Some(handler)).unwrap();

    t.write(id(30), b"ab").unwrap();
    t.write(id(30), b"cd").unwrap();
    // dropped write: no notification
    t.write(id(30), b"ef").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    t.set_handler(id(30), None).unwrap();
    let mut buf = [0u8; 4];
    t.read(id(30), &mut buf).unwrap();
    t.write(id(30), b"gh").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn streams_share_one_arena() {
    let t = StreamTable::new(100).unwrap();
    t.open(id(0), StreamOptions::new(10, 4)).unwrap();
    t.open(id(1), StreamOptions::new(10, 4)).unwrap();
    assert!(matches!(
        t.open(id(2), StreamOptions::new(10, 4)),
        Err(StreamError::OutOfMemory { .. })
    ));
    assert_eq!(t.open_ids(), vec![id(0), id(1)]);

    t.write(id(0), &[0xAA; 40]).unwrap();
    t.write(id(1), &[0xBB; 40]).unwrap();
    let mut buf = [0u8; 40];
    t.read(id(0), &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0xAA));

    let rendered = format!("{t:?}");
    assert!(rendered.contains("StreamTable"));
    assert!(rendered.contains("open: [0, 1]"));
}
