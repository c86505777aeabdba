use crate::{HostError, input, raw};
use libloading::Library;
use std::{
    cell::Cell,
    ffi::{CStr, CString, c_char, c_int, c_uint, c_void},
    path::Path,
    ptr, slice,
};
use tracing::{debug, info};

/// Pixel format negotiated by the core through `SET_PIXEL_FORMAT`.
///
/// Defaults to [`PixelFormat::Rgb1555`], which is what libretro assumes when
/// a core never issues the environment call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PixelFormat {
    #[default]
    Rgb1555,
    Xrgb8888,
    Rgb565,
}

/// A video frame captured during [`LibretroHost::run`].
///
/// `pixels` is a host-owned copy of the core's scanout (`height * pitch`
/// bytes); the core's own buffer is only valid during the refresh callback.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    pub format: PixelFormat,
}

/// Core metadata cached from `retro_get_system_info` at load time.
#[derive(Debug, Clone, Default)]
pub struct CoreInfo {
    pub library_name: String,
    pub library_version: String,
    pub valid_extensions: String,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

/// Geometry and timing cached from `retro_get_system_av_info` after a ROM
/// is loaded.
#[derive(Debug, Clone, Copy)]
pub struct AvInfo {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub aspect_ratio: f64,
    pub fps: f64,
    pub sample_rate: f64,
}

/// State the C callback trampolines need to reach.
#[derive(Default)]
struct HostShared {
    /// Joypad bitmask per controller port.
    input: [u8; 2],
    pixel_format: PixelFormat,
    frame: Option<CapturedFrame>,
    /// Interleaved stereo samples accumulated during the current `run`.
    audio: Vec<i16>,
    video_cb: Option<Box<dyn FnMut(&CapturedFrame)>>,
    audio_cb: Option<Box<dyn FnMut(&[i16])>>,
}

thread_local! {
    /// The host currently inside a plugin call on this thread. Trampolines
    /// carry no context argument, so this is how they find their way back.
    static ACTIVE: Cell<*mut HostShared> = const { Cell::new(ptr::null_mut()) };
}

/// Clears the thread-local host pointer when the plugin call unwinds.
struct ActiveGuard;

impl ActiveGuard {
    fn install(shared: *mut HostShared) -> Self {
        ACTIVE.with(|cell| cell.set(shared));
        ActiveGuard
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.with(|cell| cell.set(ptr::null_mut()));
    }
}

fn with_shared<R>(default: R, f: impl FnOnce(&mut HostShared) -> R) -> R {
    let shared = ACTIVE.with(|cell| cell.get());
    if shared.is_null() {
        return default;
    }
    // The pointer is installed by the unique &mut borrow held across the
    // plugin call, and the plugin is single-threaded.
    f(unsafe { &mut *shared })
}

unsafe extern "C" fn null_log(_level: c_uint, _fmt: *const c_char) {}

unsafe extern "C" fn environment(cmd: c_uint, data: *mut c_void) -> bool {
    match cmd {
        raw::RETRO_ENVIRONMENT_GET_LOG_INTERFACE => {
            if data.is_null() {
                return false;
            }
            let log: unsafe extern "C" fn(c_uint, *const c_char) = null_log;
            // The no-op logger never reads its varargs, so handing the core a
            // non-variadic pointer through the variadic slot is sound here.
            // Defining a variadic fn is not possible in stable Rust.
            let log: raw::retro_log_printf_t = Some(unsafe { std::mem::transmute(log) });
            unsafe { (*data.cast::<raw::retro_log_callback>()).log = log };
            true
        }
        raw::RETRO_ENVIRONMENT_GET_CAN_DUPE => {
            if !data.is_null() {
                unsafe { *data.cast::<bool>() = true };
            }
            true
        }
        raw::RETRO_ENVIRONMENT_SET_PIXEL_FORMAT => {
            if data.is_null() {
                return false;
            }
            let format = match unsafe { *data.cast::<c_int>() } {
                raw::RETRO_PIXEL_FORMAT_0RGB1555 => PixelFormat::Rgb1555,
                raw::RETRO_PIXEL_FORMAT_XRGB8888 => PixelFormat::Xrgb8888,
                raw::RETRO_PIXEL_FORMAT_RGB565 => PixelFormat::Rgb565,
                _ => return false,
            };
            with_shared(false, |shared| {
                shared.pixel_format = format;
                true
            })
        }
        raw::RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY
        | raw::RETRO_ENVIRONMENT_GET_SAVE_DIRECTORY
        | raw::RETRO_ENVIRONMENT_GET_CORE_ASSETS_DIRECTORY => {
            // Headless: no directories to offer.
            if !data.is_null() {
                unsafe { *data.cast::<*const c_char>() = ptr::null() };
            }
            false
        }
        raw::RETRO_ENVIRONMENT_SET_INPUT_DESCRIPTORS
        | raw::RETRO_ENVIRONMENT_SET_VARIABLES
        | raw::RETRO_ENVIRONMENT_SET_SUPPORT_NO_GAME
        | raw::RETRO_ENVIRONMENT_SET_MEMORY_MAPS => true,
        _ => false,
    }
}

unsafe extern "C" fn video_refresh(data: *const c_void, width: c_uint, height: c_uint, pitch: usize) {
    with_shared((), |shared| {
        if data.is_null() {
            // Frame dupe: the previous capture stays current.
            return;
        }
        let bytes = unsafe { slice::from_raw_parts(data.cast::<u8>(), height as usize * pitch) };
        let frame = CapturedFrame {
            pixels: bytes.to_vec(),
            width,
            height,
            pitch,
            format: shared.pixel_format,
        };
        if let Some(cb) = shared.video_cb.as_mut() {
            cb(&frame);
        }
        shared.frame = Some(frame);
    })
}

unsafe extern "C" fn audio_sample(left: i16, right: i16) {
    with_shared((), |shared| {
        shared.audio.push(left);
        shared.audio.push(right);
    })
}

unsafe extern "C" fn audio_sample_batch(data: *const i16, frames: usize) -> usize {
    with_shared(frames, |shared| {
        if !data.is_null() {
            let samples = unsafe { slice::from_raw_parts(data, frames * 2) };
            shared.audio.extend_from_slice(samples);
        }
        frames
    })
}

unsafe extern "C" fn input_poll() {}

unsafe extern "C" fn input_state(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16 {
    with_shared(0, |shared| {
        if port >= 2 || device != raw::RETRO_DEVICE_JOYPAD || index != 0 {
            return 0;
        }
        let mask = shared.input[port as usize];
        if id == raw::RETRO_DEVICE_ID_JOYPAD_MASK {
            input::aggregate_state(mask)
        } else {
            input::button_state(mask, id)
        }
    })
}

/// Every entry point the host resolves from the core. Loading fails if any
/// is missing, so none of these are optional.
struct CoreSymbols {
    init: raw::retro_init_fn,
    deinit: raw::retro_deinit_fn,
    api_version: raw::retro_api_version_fn,
    get_system_info: raw::retro_get_system_info_fn,
    get_system_av_info: raw::retro_get_system_av_info_fn,
    set_environment: raw::retro_set_environment_fn,
    set_video_refresh: raw::retro_set_video_refresh_fn,
    set_audio_sample: raw::retro_set_audio_sample_fn,
    set_audio_sample_batch: raw::retro_set_audio_sample_batch_fn,
    set_input_poll: raw::retro_set_input_poll_fn,
    set_input_state: raw::retro_set_input_state_fn,
    set_controller_port_device: raw::retro_set_controller_port_device_fn,
    reset: raw::retro_reset_fn,
    run: raw::retro_run_fn,
    serialize_size: raw::retro_serialize_size_fn,
    serialize: raw::retro_serialize_fn,
    unserialize: raw::retro_unserialize_fn,
    load_game: raw::retro_load_game_fn,
    unload_game: raw::retro_unload_game_fn,
    get_memory_data: raw::retro_get_memory_data_fn,
    get_memory_size: raw::retro_get_memory_size_fn,
}

unsafe fn resolve<T: Copy + 'static>(lib: &Library, name: &'static [u8]) -> Result<T, HostError> {
    unsafe { lib.get::<T>(name) }.map(|sym| *sym).map_err(|e| {
        HostError::CoreLoad(format!(
            "missing symbol {}: {e}",
            String::from_utf8_lossy(&name[..name.len() - 1])
        ))
    })
}

impl CoreSymbols {
    /// # Safety
    /// `lib` must be a libretro core; the resolved pointers are only valid
    /// while the library stays loaded.
    unsafe fn load(lib: &Library) -> Result<Self, HostError> {
        unsafe {
            Ok(Self {
                init: resolve(lib, b"retro_init\0")?,
                deinit: resolve(lib, b"retro_deinit\0")?,
                api_version: resolve(lib, b"retro_api_version\0")?,
                get_system_info: resolve(lib, b"retro_get_system_info\0")?,
                get_system_av_info: resolve(lib, b"retro_get_system_av_info\0")?,
                set_environment: resolve(lib, b"retro_set_environment\0")?,
                set_video_refresh: resolve(lib, b"retro_set_video_refresh\0")?,
                set_audio_sample: resolve(lib, b"retro_set_audio_sample\0")?,
                set_audio_sample_batch: resolve(lib, b"retro_set_audio_sample_batch\0")?,
                set_input_poll: resolve(lib, b"retro_set_input_poll\0")?,
                set_input_state: resolve(lib, b"retro_set_input_state\0")?,
                set_controller_port_device: resolve(lib, b"retro_set_controller_port_device\0")?,
                reset: resolve(lib, b"retro_reset\0")?,
                run: resolve(lib, b"retro_run\0")?,
                serialize_size: resolve(lib, b"retro_serialize_size\0")?,
                serialize: resolve(lib, b"retro_serialize\0")?,
                unserialize: resolve(lib, b"retro_unserialize\0")?,
                load_game: resolve(lib, b"retro_load_game\0")?,
                unload_game: resolve(lib, b"retro_unload_game\0")?,
                get_memory_data: resolve(lib, b"retro_get_memory_data\0")?,
                get_memory_size: resolve(lib, b"retro_get_memory_size\0")?,
            })
        }
    }
}

struct LoadedRom {
    /// Kept alive for cores that hold onto the content buffer.
    _bytes: Vec<u8>,
}

/// A loaded libretro core plus the state its callbacks write into.
///
/// The host is single-threaded: every method must be called from the thread
/// that created it, and the value is deliberately not `Send`.
pub struct LibretroHost {
    shared: Box<HostShared>,
    symbols: CoreSymbols,
    /// Dropped last; the symbol table points into it.
    _library: Library,
    core_info: CoreInfo,
    av_info: Option<AvInfo>,
    rom: Option<LoadedRom>,
}

impl LibretroHost {
    /// Loads a core, checks its API version, registers the callback
    /// trampolines and runs `retro_init`.
    pub fn load(core_path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = core_path.as_ref();
        let library = unsafe { Library::new(path) }
            .map_err(|e| HostError::CoreLoad(format!("{}: {e}", path.display())))?;
        let symbols = unsafe { CoreSymbols::load(&library)? };

        let version = unsafe { (symbols.api_version)() };
        if version != raw::RETRO_API_VERSION {
            return Err(HostError::ApiVersion {
                expected: raw::RETRO_API_VERSION,
                found: version,
            });
        }

        let mut host = Self {
            shared: Box::new(HostShared::default()),
            symbols,
            _library: library,
            core_info: CoreInfo::default(),
            av_info: None,
            rom: None,
        };

        host.with_plugin(|sym| unsafe {
            (sym.set_environment)(Some(environment));
            (sym.set_video_refresh)(Some(video_refresh));
            (sym.set_audio_sample)(Some(audio_sample));
            (sym.set_audio_sample_batch)(Some(audio_sample_batch));
            (sym.set_input_poll)(Some(input_poll));
            (sym.set_input_state)(Some(input_state));
            (sym.init)();
        });

        let mut info = raw::retro_system_info {
            library_name: ptr::null(),
            library_version: ptr::null(),
            valid_extensions: ptr::null(),
            need_fullpath: false,
            block_extract: false,
        };
        host.with_plugin(|sym| unsafe { (sym.get_system_info)(&mut info) });
        host.core_info = CoreInfo {
            library_name: c_string(info.library_name),
            library_version: c_string(info.library_version),
            valid_extensions: c_string(info.valid_extensions),
            need_fullpath: info.need_fullpath,
            block_extract: info.block_extract,
        };
        info!(
            name = %host.core_info.library_name,
            version = %host.core_info.library_version,
            "loaded libretro core"
        );
        Ok(host)
    }

    /// Reads the ROM from disk and hands it to the core. On success both
    /// controller ports are configured as joypads.
    pub fn load_rom(&mut self, rom_path: impl AsRef<Path>) -> Result<(), HostError> {
        let path = rom_path.as_ref();
        self.unload_rom();

        let bytes = std::fs::read(path)
            .map_err(|e| HostError::RomLoad(format!("{}: {e}", path.display())))?;
        let c_path = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|_| HostError::RomLoad(format!("{}: path contains NUL", path.display())))?;
        let info = raw::retro_game_info {
            path: c_path.as_ptr(),
            data: bytes.as_ptr().cast(),
            size: bytes.len(),
            meta: ptr::null(),
        };

        let accepted = self.with_plugin(|sym| unsafe { (sym.load_game)(&info) });
        if !accepted {
            return Err(HostError::RomLoad(format!(
                "core rejected {}",
                path.display()
            )));
        }

        let mut av = raw::retro_system_av_info::default();
        self.with_plugin(|sym| unsafe {
            (sym.get_system_av_info)(&mut av);
            (sym.set_controller_port_device)(0, raw::RETRO_DEVICE_JOYPAD);
            (sym.set_controller_port_device)(1, raw::RETRO_DEVICE_JOYPAD);
        });
        self.av_info = Some(AvInfo {
            base_width: av.geometry.base_width,
            base_height: av.geometry.base_height,
            max_width: av.geometry.max_width,
            max_height: av.geometry.max_height,
            aspect_ratio: f64::from(av.geometry.aspect_ratio),
            fps: av.timing.fps,
            sample_rate: av.timing.sample_rate,
        });
        self.rom = Some(LoadedRom { _bytes: bytes });
        debug!(rom = %path.display(), "loaded content");
        Ok(())
    }

    pub fn unload_rom(&mut self) {
        if self.rom.take().is_some() {
            self.with_plugin(|sym| unsafe { (sym.unload_game)() });
            self.av_info = None;
        }
    }

    pub fn is_rom_loaded(&self) -> bool {
        self.rom.is_some()
    }

    pub fn core_info(&self) -> &CoreInfo {
        &self.core_info
    }

    pub fn av_info(&self) -> Option<AvInfo> {
        self.av_info
    }

    /// Soft-resets the emulated machine.
    pub fn reset(&mut self) {
        if self.rom.is_some() {
            self.with_plugin(|sym| unsafe { (sym.reset)() });
        }
    }

    /// Emulates one frame. Audio accumulated from the previous frame is
    /// discarded first; the flushed samples go to the audio callback, if any.
    pub fn run(&mut self) {
        if self.rom.is_none() {
            return;
        }
        self.shared.audio.clear();
        self.with_plugin(|sym| unsafe { (sym.run)() });

        let HostShared { audio, audio_cb, .. } = &mut *self.shared;
        if let Some(cb) = audio_cb
            && !audio.is_empty()
        {
            cb(audio.as_slice());
        }
    }

    /// Sets the joypad bitmask for a controller port (0 or 1).
    pub fn set_input(&mut self, port: usize, mask: u8) {
        if port < 2 {
            self.shared.input[port] = mask;
        }
    }

    /// Zero-copy view of the core's system RAM. Empty when no ROM is loaded
    /// or the core exposes no such region.
    pub fn ram(&self) -> &[u8] {
        if self.rom.is_none() {
            return &[];
        }
        let data = unsafe { (self.symbols.get_memory_data)(raw::RETRO_MEMORY_SYSTEM_RAM) };
        let size = unsafe { (self.symbols.get_memory_size)(raw::RETRO_MEMORY_SYSTEM_RAM) };
        if data.is_null() || size == 0 {
            return &[];
        }
        unsafe { slice::from_raw_parts(data.cast::<u8>(), size) }
    }

    /// Size of the core's serialized state. Fixed for a loaded ROM.
    pub fn state_size(&self) -> usize {
        if self.rom.is_none() {
            return 0;
        }
        unsafe { (self.symbols.serialize_size)() }
    }

    /// Serializes the full emulator state into `buf`, which must hold at
    /// least [`state_size`](Self::state_size) bytes.
    pub fn save_state(&mut self, buf: &mut [u8]) -> bool {
        if self.rom.is_none() || buf.len() < self.state_size() {
            return false;
        }
        let (data, len) = (buf.as_mut_ptr().cast::<c_void>(), buf.len());
        self.with_plugin(|sym| unsafe { (sym.serialize)(data, len) })
    }

    /// Restores emulator state previously produced by [`save_state`](Self::save_state).
    pub fn load_state(&mut self, buf: &[u8]) -> bool {
        if self.rom.is_none() {
            return false;
        }
        let (data, len) = (buf.as_ptr().cast::<c_void>(), buf.len());
        self.with_plugin(|sym| unsafe { (sym.unserialize)(data, len) })
    }

    /// The frame most recently captured by the video trampoline.
    pub fn frame(&self) -> Option<&CapturedFrame> {
        self.shared.frame.as_ref()
    }

    /// Interleaved stereo samples accumulated during the last [`run`](Self::run).
    pub fn audio(&self) -> &[i16] {
        &self.shared.audio
    }

    /// Registers a callback invoked for every frame the core refreshes.
    pub fn set_video_callback(&mut self, cb: impl FnMut(&CapturedFrame) + 'static) {
        self.shared.video_cb = Some(Box::new(cb));
    }

    /// Registers a callback invoked with the accumulated samples at the end
    /// of every [`run`](Self::run).
    pub fn set_audio_callback(&mut self, cb: impl FnMut(&[i16]) + 'static) {
        self.shared.audio_cb = Some(Box::new(cb));
    }

    fn with_plugin<R>(&mut self, f: impl FnOnce(&CoreSymbols) -> R) -> R {
        let _guard = ActiveGuard::install(&mut *self.shared);
        f(&self.symbols)
    }
}

impl Drop for LibretroHost {
    fn drop(&mut self) {
        self.unload_rom();
        self.with_plugin(|sym| unsafe { (sym.deinit)() });
    }
}

fn c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
