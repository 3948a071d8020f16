#![no_main]
use libfuzzer_sys::fuzz_target;
use miniss_crypto::{kdf::SymmetricKey, RecordOpener};
use miniss_stream::frame::read_record_body;

// Arbitrary bytes arriving on the wire must never open as a record.
fuzz_target!(|data: &[u8]| {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let mut wire = data;
        let mut opener = RecordOpener::new(&SymmetricKey::new([0x42; 32]));
        while let Ok(body) = read_record_body(&mut wire).await {
            if opener.open(&body).is_ok() {
                panic!("forged record accepted");
            }
        }
    });
});
