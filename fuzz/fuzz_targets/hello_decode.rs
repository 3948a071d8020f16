#![no_main]
use libfuzzer_sys::fuzz_target;
use miniss_stream::{Hello, HELLO_LEN, VERSION_TAG};

fuzz_target!(|data: &[u8]| {
    let Ok(bytes) = <[u8; HELLO_LEN]>::try_from(data) else { return };
    match Hello::decode(&bytes) {
        Ok(hello) => {
            assert_eq!(&bytes[..8], VERSION_TAG);
            assert_eq!(hello.encode(), bytes);
        }
        Err(_) => assert_ne!(&bytes[..8], VERSION_TAG),
    }
});
