//! End-to-end tests against a scripted in-process RFB server.

use rfbc_client::{Client, Config, Status};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn read_exact(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).expect("client hung up early");
    buf
}

fn server_init(width: u16, height: u16, name: &str) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.extend_from_slice(&width.to_be_bytes());
    msg.extend_from_slice(&height.to_be_bytes());
    msg.extend_from_slice(&[32, 24, 0, 1]);
    for _ in 0..3 {
        msg.extend_from_slice(&255u16.to_be_bytes());
    }
    msg.extend_from_slice(&[16, 8, 0, 0, 0, 0]);
    msg.extend_from_slice(&(name.len() as u32).to_be_bytes());
    msg.extend_from_slice(name.as_bytes());
    msg
}

fn raw_update(x: u16, y: u16, w: u16, h: u16, pixels: &[u8]) -> Vec<u8> {
    let mut msg = vec![0, 0, 0, 1];
    msg.extend_from_slice(&x.to_be_bytes());
    msg.extend_from_slice(&y.to_be_bytes());
    msg.extend_from_slice(&w.to_be_bytes());
    msg.extend_from_slice(&h.to_be_bytes());
    msg.extend_from_slice(&0i32.to_be_bytes()); // raw encoding
    msg.extend_from_slice(pixels);
    msg
}

/// Run the 3.8 handshake from the server side, through the client's
/// SetEncodings and initial full update request.
fn handshake(stream: &mut TcpStream, width: u16, height: u16) {
    stream.write_all(b"RFB 003.008\n").unwrap();
    assert_eq!(read_exact(stream, 12), b"RFB 003.008\n");

    stream.write_all(&[1, 1]).unwrap(); // one security type: None
    assert_eq!(read_exact(stream, 1), [1]);
    stream.write_all(&[0, 0, 0, 0]).unwrap(); // SecurityResult OK

    assert_eq!(read_exact(stream, 1), [1]); // shared ClientInit
    stream.write_all(&server_init(width, height, "itest")).unwrap();

    // SetEncodings: header + 6 encoding ids.
    let set_encodings = read_exact(stream, 4 + 6 * 4);
    assert_eq!(set_encodings[0], 2);
    assert_eq!(u16::from_be_bytes([set_encodings[2], set_encodings[3]]), 6);

    // Initial update request must be non-incremental and full-screen.
    let request = read_exact(stream, 10);
    assert_eq!(request[0], 3);
    assert_eq!(request[1], 0);
    assert_eq!(u16::from_be_bytes([request[6], request[7]]), width);
    assert_eq!(u16::from_be_bytes([request[8], request[9]]), height);
}

/// Read and discard until the client disconnects.
fn drain(stream: &mut TcpStream) {
    let mut sink = [0u8; 256];
    while matches!(stream.read(&mut sink), Ok(n) if n > 0) {}
}

#[test]
fn handshake_update_and_input_round_trip() {
    init_logs();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        handshake(&mut stream, 2, 2);

        let pixels: Vec<u8> = (0..16).collect();
        stream.write_all(&raw_update(0, 0, 2, 2, &pixels)).unwrap();

        // The pointer event queued by the test.
        let pointer = read_exact(&mut stream, 6);
        assert_eq!(pointer, [5, 0x01, 0, 1, 0, 2]);

        // Then the explicit incremental refresh.
        let refresh = read_exact(&mut stream, 10);
        assert_eq!((refresh[0], refresh[1]), (3, 1));

        drain(&mut stream);
    });

    let client = Client::connect(Config::new("127.0.0.1", port)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        client.status() == Status::Connected
    }));
    assert_eq!(client.size(), (2, 2));

    let mut frame = vec![0u8; 16];
    assert!(wait_until(Duration::from_secs(5), || {
        client.copy_frame(&mut frame, 8, 2, 2)
    }));
    // Rows come out bottom-first.
    let expected: Vec<u8> = (8..16).chain(0..8).collect();
    assert_eq!(frame, expected);

    // Mismatched dimensions are refused.
    let mut wrong = vec![0u8; 8];
    assert!(!client.copy_frame(&mut wrong, 8, 2, 1));

    client.send_pointer(1, 2, 0x01);
    client.request_refresh(true);

    client.close();
    server.join().unwrap();
}

#[test]
fn reconnects_after_connection_drop() {
    init_logs();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        // First connection dies mid-handshake.
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"RFB 003.008\n").unwrap();
        let _ = read_exact(&mut stream, 12);
        drop(stream);

        // Second connection completes.
        let (mut stream, _) = listener.accept().unwrap();
        handshake(&mut stream, 1, 1);
        stream
            .write_all(&raw_update(0, 0, 1, 1, &[7, 8, 9, 0]))
            .unwrap();
        drain(&mut stream);
    });

    let client = Client::connect(Config::new("127.0.0.1", port)).unwrap();
    let mut frame = vec![0u8; 4];
    assert!(wait_until(Duration::from_secs(10), || {
        client.copy_frame(&mut frame, 4, 1, 1)
    }));
    assert_eq!(frame, [7, 8, 9, 0]);
    assert_eq!(client.status(), Status::Connected);

    client.close();
    server.join().unwrap();
}

#[test]
fn frame_is_withheld_until_update_completes() {
    init_logs();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        handshake(&mut stream, 2, 1);

        // Send all but the last byte of the update, then stall.
        let update = raw_update(0, 0, 2, 1, &[1, 2, 3, 4, 5, 6, 7, 8]);
        stream.write_all(&update[..update.len() - 1]).unwrap();
        thread::sleep(Duration::from_millis(300));
        stream.write_all(&update[update.len() - 1..]).unwrap();

        drain(&mut stream);
    });

    let client = Client::connect(Config::new("127.0.0.1", port)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        client.status() == Status::Connected
    }));

    let mut frame = vec![0u8; 8];
    // The partial update must never become visible.
    thread::sleep(Duration::from_millis(150));
    assert!(!client.copy_frame(&mut frame, 8, 2, 1));

    assert!(wait_until(Duration::from_secs(5), || {
        client.copy_frame(&mut frame, 8, 2, 1)
    }));
    assert_eq!(frame, [1, 2, 3, 4, 5, 6, 7, 8]);

    client.close();
    server.join().unwrap();
}

#[test]
fn close_returns_while_disconnected() {
    init_logs();
    // Grab a port with no listener behind it.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = Client::connect(Config::new("127.0.0.1", port)).unwrap();
    thread::sleep(Duration::from_millis(250));
    assert_eq!(client.status(), Status::Connecting);
    // Must join the transport thread promptly even though it never
    // connected.
    client.close();
}

#[test]
fn unresolvable_host_is_terminal() {
    init_logs();
    let client = Client::connect(Config::new("rfbc-no-such-host.invalid", 5900)).unwrap();
    assert!(wait_until(Duration::from_secs(10), || {
        client.status() == Status::Error
    }));
    client.close();
}

#[test]
fn invalid_config_is_rejected_up_front() {
    assert!(Client::connect(Config::new("", 5900)).is_err());
    assert!(Client::connect(Config::new("localhost", 0)).is_err());
}
