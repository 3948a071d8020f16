use std::io;
use std::time::Duration;

use miniss_crypto::StaticKeyPair;
use miniss_stream::{handshake, handshake_with_config, ChannelError, Field, HandshakeConfig, Hello, HELLO_LEN};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[tokio::test]
async fn peers_agree_and_exchange_hello() {
    let _ = tracing_subscriber::fmt::try_init();
    let (a_io, b_io) = tokio::io::duplex(64 * 1024);
    let (ka, kb) = (StaticKeyPair::generate(), StaticKeyPair::generate());
    let (pa, pb) = (ka.public(), kb.public());

    let (a, b) = tokio::join!(handshake(a_io, ka), handshake(b_io, kb));
    let (mut a, mut b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.remote_pk(), pb);
    assert_eq!(b.remote_pk(), pa);
    assert_eq!(a.local_pk(), pa);
    assert_eq!(b.local_static().public(), pb);

    a.write(b"hello").await.unwrap();
    let mut buf = [0u8; 5];
    b.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello");

    b.write(b"world").await.unwrap();
    a.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"world");
}

#[tokio::test]
async fn handshake_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_key = StaticKeyPair::generate();
    let server_pk = server_key.public();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut sock = handshake(stream, server_key).await.unwrap();
        let mut buf = [0u8; 4];
        sock.read_exact(&mut buf).await.unwrap();
        sock.write(&buf).await.unwrap();
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = handshake(stream, StaticKeyPair::generate()).await.unwrap();
    assert_eq!(client.remote_pk(), server_pk);
    client.write(b"echo").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"echo");
    server.await.unwrap();
}

#[tokio::test]
async fn wrong_version_tag_is_protocol_violation() {
    let (a_io, mut peer) = tokio::io::duplex(64 * 1024);
    let mut bogus = Hello::new(StaticKeyPair::generate().public(), StaticKeyPair::generate().public()).encode();
    bogus[..8].copy_from_slice(b"MiniSS-2");
    peer.write_all(&bogus).await.unwrap();

    let err = handshake(a_io, StaticKeyPair::generate()).await.unwrap_err();
    assert!(matches!(err, ChannelError::ProtocolViolation(_)), "got {err:?}");

    // Our own hello still went out before the failure.
    let mut ours = [0u8; HELLO_LEN];
    peer.read_exact(&mut ours).await.unwrap();
    assert_eq!(&ours[..8], b"MiniSS-1");
}

#[tokio::test]
async fn short_hello_is_truncation() {
    let (a_io, mut peer) = tokio::io::duplex(64 * 1024);
    peer.write_all(b"MiniSS-1 and then nothing").await.unwrap();
    drop(peer);

    let err = handshake(a_io, StaticKeyPair::generate()).await.unwrap_err();
    match err {
        ChannelError::Truncation { field, expected, received } => {
            assert_eq!(field, Field::Hello);
            assert_eq!(expected, HELLO_LEN);
            assert_eq!(received, 25);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn silent_peer_times_out() {
    let (a_io, _peer) = tokio::io::duplex(64 * 1024);
    let config = HandshakeConfig::with_timeout(Duration::from_millis(50));

    let err = handshake_with_config(a_io, StaticKeyPair::generate(), &config).await.unwrap_err();
    match err {
        ChannelError::Transport(inner) => assert_eq!(inner.kind(), io::ErrorKind::TimedOut),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn reflected_hello_fails_liveness() {
    // A peer that echoes every byte back makes us talk to ourselves.
    let (a_io, peer) = tokio::io::duplex(64 * 1024);
    let (mut rd, mut wr) = tokio::io::split(peer);
    let mirror = tokio::spawn(async move {
        let _ = tokio::io::copy(&mut rd, &mut wr).await;
    });

    let err = handshake(a_io, StaticKeyPair::generate()).await.unwrap_err();
    assert!(matches!(err, ChannelError::LivenessCheckFailure(_)), "got {err:?}");
    mirror.abort();
}
