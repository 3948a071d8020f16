use miniss_crypto::StaticKeyPair;
use miniss_stream::{handshake, SecureSocket, MAX_RECORD_PLAINTEXT};
use proptest::prelude::*;
use tokio::io::DuplexStream;

async fn connected_pair() -> (SecureSocket<DuplexStream>, SecureSocket<DuplexStream>) {
    let (a_io, b_io) = tokio::io::duplex(64 * 1024);
    let (a, b) = tokio::join!(
        handshake(a_io, StaticKeyPair::generate()),
        handshake(b_io, StaticKeyPair::generate()),
    );
    (a.unwrap(), b.unwrap())
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Write `data` on `a` while reading it back on `b` in chunks of `chunk` bytes.
async fn transfer(a: &mut SecureSocket<DuplexStream>, b: &mut SecureSocket<DuplexStream>, data: &[u8], chunk: usize) -> Vec<u8> {
    let reader = async {
        let mut out = Vec::with_capacity(data.len());
        let mut buf = vec![0u8; chunk];
        while out.len() < data.len() {
            let n = b.read(&mut buf).await.unwrap();
            out.extend_from_slice(&buf[..n]);
        }
        out
    };
    let (written, received) = tokio::join!(a.write(data), reader);
    assert_eq!(written.unwrap(), data.len());
    received
}

#[tokio::test]
async fn large_write_spans_records() {
    let (mut a, mut b) = connected_pair().await;
    let data = pattern(3 * MAX_RECORD_PLAINTEXT + 123);
    let received = transfer(&mut a, &mut b, &data, 1000).await;
    assert_eq!(received, data);
}

#[tokio::test]
async fn reads_never_cross_record_boundaries() {
    let (mut a, mut b) = connected_pair().await;
    let data = pattern(MAX_RECORD_PLAINTEXT + 10);
    let mut big = vec![0u8; data.len()];

    let (written, first) = tokio::join!(a.write(&data), b.read(&mut big));
    written.unwrap();
    // The first record holds exactly the maximum plaintext.
    assert_eq!(first.unwrap(), MAX_RECORD_PLAINTEXT);
    let second = b.read(&mut big[MAX_RECORD_PLAINTEXT..]).await.unwrap();
    assert_eq!(second, 10);
    assert_eq!(big, data);
}

#[tokio::test]
async fn split_halves_run_in_separate_tasks() {
    let (a, mut b) = connected_pair().await;
    let (mut reader, mut writer) = a.into_split();

    let echo = tokio::spawn(async move {
        let mut buf = [0u8; 64];
        loop {
            match b.read(&mut buf).await {
                Ok(0) => continue,
                Ok(n) => {
                    b.write(&buf[..n]).await.unwrap();
                }
                Err(e) => {
                    assert!(e.is_clean_close(), "unexpected error {e:?}");
                    break;
                }
            }
        }
    });

    let send = tokio::spawn(async move {
        for i in 0..50u32 {
            writer.write(&i.to_be_bytes()).await.unwrap();
        }
        writer.shutdown().await.unwrap();
    });

    let mut got = vec![0u8; 50 * 4];
    reader.read_exact(&mut got).await.unwrap();
    for (i, chunk) in got.chunks(4).enumerate() {
        assert_eq!(u32::from_be_bytes(chunk.try_into().unwrap()), i as u32);
    }

    send.await.unwrap();
    echo.await.unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn write_then_read_reproduces_bytes(len in 0usize..=1_000_000, chunk in 64usize..70_000) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let data = pattern(len);
        let received = rt.block_on(async {
            let (mut a, mut b) = connected_pair().await;
            transfer(&mut a, &mut b, &data, chunk).await
        });
        prop_assert_eq!(received, data);
    }
}
