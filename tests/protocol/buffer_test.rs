use std::thread;
use std::time::Duration;

use typst_bridge::protocol::{
    required_words, ReadError, SharedBuffer, Status, HEADER_WORDS, MAX_BYTES, STATUS_PENDING,
};

#[test]
fn test_required_words_formula() {
    assert_eq!(required_words(0), 2);
    assert_eq!(required_words(1), 3);
    assert_eq!(required_words(4), 3);
    assert_eq!(required_words(5), 4);
    assert_eq!(required_words(1000), 252);
}

#[test]
fn test_success_grows_to_required_capacity() {
    let buffer = SharedBuffer::new();
    assert_eq!(buffer.capacity_words(), HEADER_WORDS);

    let payload = vec![7u8; 1000];
    buffer.write_success(&payload).unwrap();

    assert_eq!(buffer.capacity_words(), required_words(1000));
    assert_eq!(buffer.payload_len(), 1000);
    assert_eq!(buffer.status(), Status::Success);
}

#[test]
fn test_large_buffer_is_not_shrunk() {
    let buffer = SharedBuffer::with_capacity_words(64);
    buffer.write_success(b"tiny").unwrap();
    assert_eq!(buffer.capacity_words(), 64);
    assert_eq!(buffer.payload_len(), 4);
}

#[test]
fn test_oversized_payload_fails_without_writing() {
    let buffer = SharedBuffer::new();
    assert_eq!(buffer.grow(MAX_BYTES), Err(ReadError::Generic));
    assert_eq!(buffer.status_word(), STATUS_PENDING);
    assert_eq!(buffer.capacity_words(), HEADER_WORDS);
}

#[test]
fn test_failure_has_no_payload() {
    let buffer = SharedBuffer::new();
    buffer.write_failure(ReadError::Transport);
    assert_eq!(buffer.status(), Status::Failed(ReadError::Transport));
    assert_eq!(buffer.status_word(), 3);
    assert_eq!(buffer.payload_len(), 0);
}

#[test]
fn test_worker_waits_for_host_answer() {
    let buffer = SharedBuffer::new();
    let host = buffer.clone();

    let answer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let _guard = host.completion_guard();
        host.write_success("= Héllo".as_bytes()).unwrap();
    });

    let payload = buffer.wait().unwrap();
    answer.join().unwrap();

    assert_eq!(String::from_utf8(payload).unwrap(), "= Héllo");
    assert_eq!(buffer.payload_len(), "= Héllo".len());
    assert_eq!(buffer.notify_count(), 1);
}

#[test]
fn test_worker_sees_not_found() {
    let buffer = SharedBuffer::new();
    let host = buffer.clone();

    thread::spawn(move || {
        let _guard = host.completion_guard();
        host.write_failure(ReadError::NotFound);
    })
    .join()
    .unwrap();

    assert_eq!(buffer.wait(), Err(ReadError::NotFound));
    assert_eq!(buffer.notify_count(), 1);
}

#[test]
fn test_guard_answers_on_panic() {
    let buffer = SharedBuffer::new();
    let host = buffer.clone();

    let result = thread::spawn(move || {
        let _guard = host.completion_guard();
        panic!("resolver blew up");
    })
    .join();

    assert!(result.is_err());
    assert_eq!(buffer.wait(), Err(ReadError::Generic));
    assert_eq!(buffer.notify_count(), 1);
}

#[test]
fn test_payload_is_binary_safe() {
    let buffer = SharedBuffer::new();
    let bytes: Vec<u8> = (0..=255).collect();
    buffer.write_success(&bytes).unwrap();
    buffer.notify();
    assert_eq!(buffer.wait().unwrap(), bytes);
}
