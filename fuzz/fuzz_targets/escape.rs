#![no_main]

use libfuzzer_sys::fuzz_target;
use quipu::emit::CodeWriter;
use quipu::ProjectSettings;

fuzz_target!(|data: &[u8]| {
    // The escapers must accept any byte payload without panicking, with
    // either UTF-8 passthrough setting.
    for utf8_in_src in [false, true] {
        let settings = ProjectSettings::default()
            .with_utf8_in_src(utf8_in_src)
            .with_mergeback(true);
        let mut code = Vec::new();
        let mut header = Vec::new();
        let mut w = CodeWriter::new(&settings, &mut code, &mut header, false);
        let _ = w.write_c_string_bytes(Some(data));
        let _ = w.write_c_data(Some(data));
        let _ = w.tag(quipu::TagKind::Code, 1);
    }
});
