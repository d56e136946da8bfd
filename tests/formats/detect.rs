use imagelens::{
    classify, classify_magic, ImageClassification, ImageError, ImageInspector, ImageLayout,
    ParsedImage, SliceMemory,
};

use crate::common::test_utils::map_temp_file;
use crate::common::*;

#[test]
fn magic_prefixes() {
    let cases: [([u8; 4], ImageClassification); 7] = [
        (*b"MZ\x90\x00", ImageClassification::Pe),
        (*b"\x7fELF", ImageClassification::Elf),
        ([0xcf, 0xfa, 0xed, 0xfe], ImageClassification::MachO),
        ([0xce, 0xfa, 0xed, 0xfe], ImageClassification::MachO),
        // Big-endian and fat Mach-O are not accepted
        ([0xfe, 0xed, 0xfa, 0xcf], ImageClassification::Unrecognized),
        ([0xca, 0xfe, 0xba, 0xbe], ImageClassification::Unrecognized),
        (*b"ZM\x00\x00", ImageClassification::Unrecognized),
    ];
    for (magic, expected) in cases {
        assert_eq!(classify_magic(magic), expected, "{magic:02x?}");
    }
}

#[test]
fn classify_reads_at_base() {
    let mem = SliceMemory::new(0x7000, b"\x7fELF\x02\x01\x01".to_vec());
    assert_eq!(classify(&mem, 0x7000), ImageClassification::Elf);
    // Short or absent memory cannot match a magic
    assert_eq!(classify(&mem, 0x7005), ImageClassification::Unrecognized);
    assert_eq!(classify(&mem, 0x1000), ImageClassification::Unrecognized);
}

#[test]
fn inspector_dispatches_by_magic() {
    let inspector = ImageInspector::default();
    let images = [
        (PeBuilder::new(true).build(), ImageClassification::Pe),
        (
            ElfBuilder::new(true)
                .segment(ElfSegment::new(PT_LOAD, 0, 0, 0x200, 0x200))
                .build(),
            ImageClassification::Elf,
        ),
        (MachOBuilder::new(true).build(), ImageClassification::MachO),
    ];

    for (bytes, expected) in images {
        let mem = SliceMemory::new(0, bytes);
        let parsed = inspector.parse(mem.image(ImageLayout::File)).unwrap();
        assert_eq!(parsed.classification(), expected);
        assert_eq!(parsed.image().base(), 0);
        match (&parsed, expected) {
            (ParsedImage::Pe(_), ImageClassification::Pe)
            | (ParsedImage::Elf(_), ImageClassification::Elf)
            | (ParsedImage::MachO(_), ImageClassification::MachO) => {}
            other => panic!("mismatched dispatch {other:?}"),
        }
    }

    let mem = SliceMemory::new(0, vec![0u8; 64]);
    assert!(matches!(
        inspector.parse(mem.image(ImageLayout::File)),
        Err(ImageError::UnrecognizedFormat)
    ));
}

#[test]
fn mapped_file_provider() {
    let mut rsrc = SectionWriter::new(0x1000);
    let (rva, size) = single_resource(&mut rsrc, 24, 1, 1033, b"<assembly/>");
    let bytes = PeBuilder::new(true)
        .section(".rsrc", rsrc, IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ)
        .directory(2, rva, size)
        .build();

    let (_file, mapped) = map_temp_file(&bytes, 0x20_0000);
    assert_eq!(mapped.len(), bytes.len() as u64);

    let inspector = ImageInspector::default();
    let parsed = inspector.parse(mapped.image(ImageLayout::File)).unwrap();
    let pe = parsed.as_pe().unwrap();
    let resources = pe.resources();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].data_address, Some(0x20_0000 + 0x1000 + 88));
}

#[test]
fn empty_mapped_file_is_unrecognized() {
    let (_file, mapped) = map_temp_file(&[], 0x1000);
    assert!(mapped.is_empty());

    let inspector = ImageInspector::default();
    let image = mapped.image(ImageLayout::Mapped);
    assert_eq!(inspector.classify(&image), ImageClassification::Unrecognized);
}
