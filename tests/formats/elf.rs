use imagelens::formats::elf::{DynamicTag, ElfClass, ElfMachine, ElfType, NoteKind, SegmentType};
use imagelens::{ImageError, ImageInspector, ImageLayout, ParseOptions, SliceMemory};

use crate::common::*;

const INTERP: &str = "/lib64/ld-linux-x86-64.so.2";
const DT_NULL: i64 = 0;
const DT_NEEDED: i64 = 1;
const DT_STRTAB: i64 = 5;
const DT_SONAME: i64 = 14;
const DT_DEBUG: i64 = 21;

/// Executable linked at 0x400000 with an interpreter, a build-id note, a
/// data segment and a bss-only segment.
fn executable() -> Vec<u8> {
    let builder = ElfBuilder::new(true).entry(0x40_0100);
    let interp_at = builder.first_free_offset(5);
    let mut interp = INTERP.as_bytes().to_vec();
    interp.push(0);
    let note_at = interp_at + 32;
    let note = elf_note("GNU", 3, &(0u8..16).collect::<Vec<_>>());

    let interp_seg = ElfSegment::new(
        PT_INTERP,
        interp_at as u64,
        0x40_0000 + interp_at as u64,
        interp.len() as u64,
        interp.len() as u64,
    );
    let note_seg = ElfSegment::new(
        PT_NOTE,
        note_at as u64,
        0x40_0000 + note_at as u64,
        note.len() as u64,
        note.len() as u64,
    );

    builder
        .segment(ElfSegment::new(PT_LOAD, 0, 0x40_0000, 0x1000, 0x1000))
        .segment(ElfSegment::new(PT_LOAD, 0x1000, 0x40_1000, 0x100, 0x100))
        .segment(ElfSegment::new(PT_LOAD, 0x1100, 0x40_2000, 0, 0x1000))
        .segment(interp_seg)
        .segment(note_seg)
        .data(interp_at, &interp)
        .data(note_at, &note)
        .build()
}

#[test]
fn executable_in_both_layouts() {
    let bytes = executable();
    let inspector = ImageInspector::default();

    for (layout, base) in [(ImageLayout::File, 0x1000_0000), (ImageLayout::Mapped, 0x40_0000)] {
        let mem = SliceMemory::new(base, bytes.as_slice());
        let parsed = inspector.parse(mem.image(layout)).unwrap();
        let elf = parsed.as_elf().unwrap();

        assert_eq!(elf.class(), ElfClass::Elf64);
        assert_eq!(elf.file_type(), ElfType::SharedObject);
        assert_eq!(elf.machine(), ElfMachine::X86_64);
        assert_eq!(elf.entry_point(), 0x40_0100);
        assert_eq!(parsed.entry_address(), Some(base + 0x100));
        assert_eq!(elf.program_headers().len(), 5);
        assert_eq!(elf.program_headers()[3].segment_type, SegmentType::Interp);

        assert_eq!(elf.interpreter().as_deref(), Some(INTERP));
        assert_eq!(
            elf.build_id().as_deref(),
            Some("000102030405060708090a0b0c0d0e0f")
        );
        let notes = elf.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].name, "GNU");
        assert!(matches!(notes[0].kind(), NoteKind::BuildId(_)));

        // No PT_DYNAMIC: absent rather than failed
        assert!(elf.try_dynamic_entries().unwrap().is_none());
        assert!(elf.needed_libraries().is_empty());
        assert!(elf.try_link_map().unwrap().is_none());
    }
}

#[test]
fn translation_table_skips_bss_segments() {
    let bytes = executable();
    let inspector = ImageInspector::default();
    let mem = SliceMemory::new(0, bytes);
    let parsed = inspector.parse(mem.image(ImageLayout::File)).unwrap();
    let elf = parsed.as_elf().unwrap();

    assert_eq!(elf.load_bias(), 0);
    assert_eq!(elf.translation_table().ranges().len(), 2);
    assert_eq!(elf.offset_to_vaddr(0x1010), Some(0x40_1010));
    assert_eq!(elf.vaddr_to_offset(0x40_0200), Some(0x200));
    assert_eq!(elf.vaddr_to_offset(0x40_2010), None);
    assert_eq!(elf.vaddr_to_address(0x40_2010), None);

    let bss = &elf.program_headers()[2];
    assert_eq!(elf.segment_address(bss), None);
}

#[test]
fn mapped_load_bias_follows_lowest_segment() {
    let bytes = executable();
    let inspector = ImageInspector::default();
    let base = 0x7f12_3400_0000;
    let mem = SliceMemory::new(base, bytes);
    let parsed = inspector.parse(mem.image(ImageLayout::Mapped)).unwrap();
    let elf = parsed.as_elf().unwrap();

    assert_eq!(elf.load_bias(), base - 0x40_0000);
    assert_eq!(elf.vaddr_to_address(0x40_0040), Some(base + 0x40));
    // Mapped images translate bss addresses too
    assert_eq!(elf.vaddr_to_address(0x40_2010), Some(base + 0x2010));
}

const STRINGS: &[u8] = b"\0libc.so.6\0libdemo.so.1\0libm.so.6\0";

/// Shared object with its dynamic segment and string table in one PT_LOAD
/// at vaddr 0. `strtab` is written as the DT_STRTAB value verbatim.
fn shared_object(strtab: impl Fn(u64) -> u64, extra: &[(i64, u64)]) -> (Vec<u8>, usize) {
    let builder = ElfBuilder::new(true);
    let strings_at = builder.first_free_offset(2);
    let dynamic_at = strings_at + 48;

    let mut entries = vec![
        (DT_NEEDED, 1),
        (DT_NEEDED, 24),
        (DT_SONAME, 11),
        (DT_STRTAB, strtab(strings_at as u64)),
    ];
    entries.extend_from_slice(extra);
    entries.push((DT_NULL, 0));
    let dynamic = elf64_dynamic(&entries);

    let bytes = builder
        .segment(ElfSegment::new(PT_LOAD, 0, 0, 0x1000, 0x1000))
        .segment(ElfSegment::new(
            PT_DYNAMIC,
            dynamic_at as u64,
            dynamic_at as u64,
            dynamic.len() as u64,
            dynamic.len() as u64,
        ))
        .data(strings_at, STRINGS)
        .data(dynamic_at, &dynamic)
        .build();
    (bytes, dynamic_at)
}

#[test]
fn needed_libraries_and_soname() {
    let (bytes, dynamic_at) = shared_object(|offset| offset, &[]);
    let inspector = ImageInspector::default();

    for (layout, base) in [(ImageLayout::File, 0), (ImageLayout::Mapped, 0x5555_0000_0000)] {
        let mem = SliceMemory::new(base, bytes.as_slice());
        let parsed = inspector.parse(mem.image(layout)).unwrap();
        let elf = parsed.as_elf().unwrap();

        let entries = elf.dynamic_entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].tag, DynamicTag::Needed);
        assert_eq!(entries[0].address, base + dynamic_at as u64);
        assert_eq!(entries[4].tag, DynamicTag::Null);

        assert_eq!(elf.needed_libraries(), ["libc.so.6", "libm.so.6"]);
        assert_eq!(elf.soname().as_deref(), Some("libdemo.so.1"));
        assert!(elf.link_map().is_empty());
    }
}

#[test]
fn relocated_string_table_pointer() {
    // A loader has rewritten DT_STRTAB to its runtime address
    let base = 0x5555_0000_0000;
    let (bytes, _) = shared_object(|offset| base + offset, &[]);
    let inspector = ImageInspector::default();
    let mem = SliceMemory::new(base, bytes);
    let parsed = inspector.parse(mem.image(ImageLayout::Mapped)).unwrap();
    let elf = parsed.as_elf().unwrap();

    assert_eq!(elf.needed_libraries(), ["libc.so.6", "libm.so.6"]);
}

#[test]
fn unknown_dynamic_tags_are_kept() {
    let (bytes, _) = shared_object(|offset| offset, &[(0x7000_0001, 42)]);
    let inspector = ImageInspector::default();
    let mem = SliceMemory::new(0, bytes);
    let parsed = inspector.parse(mem.image(ImageLayout::File)).unwrap();
    let entries = parsed.as_elf().unwrap().dynamic_entries();

    let unknown = &entries[4];
    assert_eq!(unknown.tag, DynamicTag::Unknown(0x7000_0001));
    assert_eq!(unknown.raw_tag, 0x7000_0001);
    assert_eq!(unknown.value, 42);
}

/// Process image at `base` whose DT_DEBUG points at an `r_debug` with a
/// two-module chain. `cycle` links the last module back to the first.
fn process_image(base: u64, cycle: bool) -> Vec<u8> {
    let r_debug = 0x400u64;
    let main_map = 0x440u64;
    let libc_map = 0x480u64;
    let libc_name = 0x4c0u64;

    let (mut bytes, _) = shared_object(|offset| offset, &[(DT_DEBUG, base + r_debug)]);
    put_u32(&mut bytes, r_debug as usize, 1);
    put_u64(&mut bytes, r_debug as usize + 8, base + main_map);

    put_u64(&mut bytes, main_map as usize, 0);
    put_u64(&mut bytes, main_map as usize + 8, 0);
    put_u64(&mut bytes, main_map as usize + 16, base + 0x200);
    put_u64(&mut bytes, main_map as usize + 24, base + libc_map);

    put_u64(&mut bytes, libc_map as usize, 0x7f00_0000_0000);
    put_u64(&mut bytes, libc_map as usize + 8, base + libc_name);
    put_u64(&mut bytes, libc_map as usize + 16, 0x7f00_0000_2000);
    put_u64(&mut bytes, libc_map as usize + 24, if cycle { base + main_map } else { 0 });
    put(&mut bytes, libc_name as usize, b"/lib/libc.so.6\0");
    bytes
}

#[test]
fn link_map_walk() {
    let base = 0x1_0000;
    let bytes = process_image(base, false);
    let inspector = ImageInspector::default();
    let mem = SliceMemory::new(base, bytes);
    let parsed = inspector.parse(mem.image(ImageLayout::Mapped)).unwrap();
    let elf = parsed.as_elf().unwrap();

    let modules = elf.link_map();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].name, "");
    assert_eq!(modules[0].dynamic, base + 0x200);
    assert_eq!(modules[0].address, base + 0x440);
    assert_eq!(modules[1].name, "/lib/libc.so.6");
    assert_eq!(modules[1].base_address, 0x7f00_0000_0000);
    assert_eq!(modules[1].dynamic, 0x7f00_0000_2000);
}

#[test]
fn link_map_cycle_and_limit() {
    let base = 0x1_0000;
    let bytes = process_image(base, true);
    let mem = SliceMemory::new(base, bytes);

    let inspector = ImageInspector::default();
    let parsed = inspector.parse(mem.image(ImageLayout::Mapped)).unwrap();
    assert_eq!(parsed.as_elf().unwrap().link_map().len(), 2);

    let limited = ImageInspector::new(ParseOptions {
        max_link_map_entries: 1,
        ..ParseOptions::default()
    });
    let parsed = limited.parse(mem.image(ImageLayout::Mapped)).unwrap();
    assert_eq!(parsed.as_elf().unwrap().link_map().len(), 1);
}

#[test]
fn unreadable_r_debug_is_an_error_for_try_link_map() {
    let base = 0x1_0000;
    let (bytes, _) = shared_object(|offset| offset, &[(DT_DEBUG, 0xdead_0000)]);
    let inspector = ImageInspector::default();
    let mem = SliceMemory::new(base, bytes);
    let parsed = inspector.parse(mem.image(ImageLayout::Mapped)).unwrap();
    let elf = parsed.as_elf().unwrap();

    assert!(elf.try_link_map().unwrap_err().is_unreadable());
    assert!(elf.link_map().is_empty());
}

#[test]
fn too_many_program_headers() {
    let bytes = executable();
    let inspector = ImageInspector::new(ParseOptions {
        max_sections: 2,
        ..ParseOptions::default()
    });
    let mem = SliceMemory::new(0, bytes);
    assert!(matches!(
        inspector.parse(mem.image(ImageLayout::File)),
        Err(ImageError::MalformedHeader { format: "ELF", .. })
    ));
}

#[test]
fn program_header_offset_past_address_space() {
    let mut bytes = ElfBuilder::new(true)
        .segment(ElfSegment::new(PT_LOAD, 0, 0, 0x100, 0x100))
        .build();
    put_u64(&mut bytes, 32, 0xFFFF_FFFF_FFFF_FF00);
    let inspector = ImageInspector::default();
    let mem = SliceMemory::new(0x1000, bytes);

    match inspector.parse(mem.image(ImageLayout::File)) {
        Err(ImageError::MalformedHeader { format, message }) => {
            assert_eq!(format, "ELF");
            assert!(message.contains("program header offset"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
}


#[test]
fn needed_string_offset_past_address_space() {
    let (bytes, _) = shared_object(|offset| offset, &[(DT_NEEDED, u64::MAX - 4)]);
    let inspector = ImageInspector::default();

    for (layout, base) in [(ImageLayout::File, 0x1000), (ImageLayout::Mapped, 0x5555_0000_0000)] {
        let mem = SliceMemory::new(base, bytes.as_slice());
        let parsed = inspector.parse(mem.image(layout)).unwrap();
        let elf = parsed.as_elf().unwrap();

        assert_eq!(elf.dynamic_entries().len(), 6);
        assert_eq!(elf.needed_libraries(), ["libc.so.6", "libm.so.6"]);
    }
}

#[test]
fn interpreter_offset_past_address_space() {
    let builder = ElfBuilder::new(true);
    let interp_at = builder.first_free_offset(2);
    let mut bytes = builder
        .clone()
        .segment(ElfSegment::new(PT_LOAD, 0, 0, 0x100, 0x100))
        .segment(ElfSegment::new(PT_INTERP, interp_at as u64, interp_at as u64, 16, 16))
        .build();
    // p_offset of the PT_INTERP header
    put_u64(&mut bytes, builder.header_size() + builder.phdr_size() + 8, u64::MAX - 8);
    let inspector = ImageInspector::default();
    let mem = SliceMemory::new(0x1000, bytes);
    let parsed = inspector.parse(mem.image(ImageLayout::File)).unwrap();
    let elf = parsed.as_elf().unwrap();

    let interp = &elf.program_headers()[1];
    assert_eq!(interp.segment_type, SegmentType::Interp);
    assert_eq!(interp.offset, u64::MAX - 8);
    assert_eq!(elf.segment_address(interp), None);
    assert_eq!(elf.interpreter(), None);
}

#[test]
fn note_limit_spans_segments() {
    let builder = ElfBuilder::new(true);
    let first_at = builder.first_free_offset(3);
    let mut first = elf_note("GNU", 3, &[0xaa; 8]);
    first.extend(elf_note("GNU", 1, &[0; 16]));
    let second_at = first_at + first.len();
    let mut second = elf_note("Go", 4, b"abcd");
    second.extend(elf_note("stapsdt", 3, &[1, 2, 3, 4]));
    let note_segment = |at: usize, len: usize| {
        ElfSegment::new(PT_NOTE, at as u64, at as u64, len as u64, len as u64)
    };
    let bytes = builder
        .segment(ElfSegment::new(PT_LOAD, 0, 0, 0x1000, 0x1000))
        .segment(note_segment(first_at, first.len()))
        .segment(note_segment(second_at, second.len()))
        .data(first_at, &first)
        .data(second_at, &second)
        .build();
    let mem = SliceMemory::new(0, bytes);

    let all = ImageInspector::default();
    let parsed = all.parse(mem.image(ImageLayout::File)).unwrap();
    assert_eq!(parsed.as_elf().unwrap().notes().len(), 4);

    let limited = ImageInspector::new(ParseOptions {
        max_notes: 3,
        ..ParseOptions::default()
    });
    let parsed = limited.parse(mem.image(ImageLayout::File)).unwrap();
    let notes = parsed.as_elf().unwrap().notes();
    let names: Vec<_> = notes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["GNU", "GNU", "Go"]);
}
