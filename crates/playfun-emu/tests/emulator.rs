//! Integration tests that drive a real libretro core.
//!
//! The core and ROM are runtime fixtures, not checked-in artifacts: the test
//! is skipped unless `LIBRETRO_CORE` and `PLAYFUN_TEST_ROM` are set. The
//! plugin is a process-wide singleton, so everything runs in one test body.

use playfun_emu::{Emulator, basis};

fn fixture() -> Option<(String, String)> {
    let core = std::env::var("LIBRETRO_CORE").ok()?;
    let rom = std::env::var("PLAYFUN_TEST_ROM").ok()?;
    Some((core, rom))
}

#[test]
fn live_core_end_to_end() {
    let Some((core, rom)) = fixture() else {
        eprintln!("skipping: set LIBRETRO_CORE and PLAYFUN_TEST_ROM to run this test");
        return;
    };
    let mut emu = Emulator::new(&core, &rom).expect("emulator init");

    // The RAM region exists and its length is stable across steps.
    let ram_len = emu.ram().len();
    assert!(ram_len >= 1);
    for _ in 0..60 {
        emu.step(0);
    }
    assert_eq!(emu.ram().len(), ram_len);

    // Stepping with input changes observable state.
    let checksum_idle = emu.ram_checksum();
    for _ in 0..60 {
        emu.step(0x80); // hold Right
    }
    assert_ne!(emu.ram_checksum(), checksum_idle);

    // Save/load identity through the compressed codec.
    let saved = emu.save();
    let ram_before = emu.memory();
    for _ in 0..100 {
        emu.step(0);
    }
    assert_ne!(emu.memory(), ram_before);
    assert!(emu.load(&saved));
    assert_eq!(emu.memory(), ram_before);

    // Basis round trip: a save differenced against a basis restores too.
    let basis_state = emu.save_uncompressed();
    let packed = emu.save_ex(&basis_state);
    for _ in 0..10 {
        emu.step(0x01);
    }
    assert!(emu.load_ex(&packed, &basis_state));
    assert_eq!(emu.memory(), ram_before);

    // Cache replay: the second pass over the same inputs is pure hits and
    // lands in the same state.
    emu.reset_cache(1000, 100);
    let start = emu.save_uncompressed();
    for _ in 0..100 {
        emu.caching_step(0);
    }
    let first_pass = emu.memory();
    assert!(emu.load_uncompressed(&start));
    for _ in 0..100 {
        emu.caching_step(0);
    }
    assert_eq!(emu.memory(), first_pass);
    assert_eq!(emu.cache_stats().hits, 100);
    assert_eq!(emu.cache_stats().misses, 100);

    // Basis oracle: the first call writes the file, the second reads it back
    // without advancing the emulator.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("basis");
    let script = vec![0u8; 120];
    let computed = basis::load_or_compute_basis(&mut emu, &script, 60, &path);
    let checksum = emu.ram_checksum();
    let reloaded = basis::load_or_compute_basis(&mut emu, &script, 60, &path);
    assert_eq!(computed, reloaded);
    assert_eq!(emu.ram_checksum(), checksum);

    // A full step captures video and audio.
    emu.step_full(0);
    assert_eq!(emu.image().len(), 256 * 256 * 4);
    assert!(!emu.sound().is_empty());

    // Only one live emulator per process; the slot frees on drop.
    assert!(matches!(
        Emulator::new(&core, &rom),
        Err(playfun_emu::EmuError::AlreadyInitialized)
    ));
    drop(emu);
    let emu2 = Emulator::new(&core, &rom).expect("re-initialization after drop");
    drop(emu2);
}
