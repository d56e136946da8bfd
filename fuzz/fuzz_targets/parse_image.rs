#![no_main]
use imagelens::{ImageInspector, ImageLayout, ParsedImage, SliceMemory};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let inspector = ImageInspector::default();
    let mem = SliceMemory::new(0x10000, data);
    for layout in [ImageLayout::File, ImageLayout::Mapped] {
        let Ok(parsed) = inspector.parse(mem.image(layout)) else {
            continue;
        };
        match &parsed {
            ParsedImage::Pe(pe) => {
                let _ = pe.imports();
                let _ = pe.delay_imports();
                let _ = pe.exports();
                let _ = pe.codeview();
                let _ = pe.version_info();
                for entry in pe.resources() {
                    let _ = entry.content();
                }
            }
            ParsedImage::Elf(elf) => {
                let _ = elf.interpreter();
                let _ = elf.build_id();
                let _ = elf.needed_libraries();
                let _ = elf.link_map();
            }
            ParsedImage::MachO(macho) => {
                let _ = macho.segments();
                let _ = macho.dylibs();
                let _ = macho.entry_address();
            }
        }
    }
});
