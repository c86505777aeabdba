//! Hand-declared subset of the libretro C ABI consumed by the host.
//!
//! A frontend links against no `libretro.h` at build time (the core is
//! resolved at runtime), so the types and constants the host touches are
//! declared here. Names and values follow the upstream header.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_uint, c_void};

pub const RETRO_API_VERSION: c_uint = 1;

pub const RETRO_DEVICE_JOYPAD: c_uint = 1;

pub const RETRO_DEVICE_ID_JOYPAD_B: c_uint = 0;
pub const RETRO_DEVICE_ID_JOYPAD_Y: c_uint = 1;
pub const RETRO_DEVICE_ID_JOYPAD_SELECT: c_uint = 2;
pub const RETRO_DEVICE_ID_JOYPAD_START: c_uint = 3;
pub const RETRO_DEVICE_ID_JOYPAD_UP: c_uint = 4;
pub const RETRO_DEVICE_ID_JOYPAD_DOWN: c_uint = 5;
pub const RETRO_DEVICE_ID_JOYPAD_LEFT: c_uint = 6;
pub const RETRO_DEVICE_ID_JOYPAD_RIGHT: c_uint = 7;
pub const RETRO_DEVICE_ID_JOYPAD_A: c_uint = 8;
pub const RETRO_DEVICE_ID_JOYPAD_X: c_uint = 9;
/// Aggregate query: all buttons at once, one bit per `RETRO_DEVICE_ID_JOYPAD_*`.
pub const RETRO_DEVICE_ID_JOYPAD_MASK: c_uint = 256;

pub const RETRO_MEMORY_SYSTEM_RAM: c_uint = 2;

pub const RETRO_ENVIRONMENT_EXPERIMENTAL: c_uint = 0x10000;

pub const RETRO_ENVIRONMENT_GET_CAN_DUPE: c_uint = 3;
pub const RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY: c_uint = 9;
pub const RETRO_ENVIRONMENT_SET_PIXEL_FORMAT: c_uint = 10;
pub const RETRO_ENVIRONMENT_SET_INPUT_DESCRIPTORS: c_uint = 11;
pub const RETRO_ENVIRONMENT_SET_VARIABLES: c_uint = 16;
pub const RETRO_ENVIRONMENT_SET_SUPPORT_NO_GAME: c_uint = 18;
pub const RETRO_ENVIRONMENT_GET_LOG_INTERFACE: c_uint = 27;
pub const RETRO_ENVIRONMENT_GET_CORE_ASSETS_DIRECTORY: c_uint = 30;
pub const RETRO_ENVIRONMENT_GET_SAVE_DIRECTORY: c_uint = 31;
pub const RETRO_ENVIRONMENT_SET_MEMORY_MAPS: c_uint = 36 | RETRO_ENVIRONMENT_EXPERIMENTAL;

pub const RETRO_PIXEL_FORMAT_0RGB1555: c_int = 0;
pub const RETRO_PIXEL_FORMAT_XRGB8888: c_int = 1;
pub const RETRO_PIXEL_FORMAT_RGB565: c_int = 2;

pub type retro_environment_t =
    Option<unsafe extern "C" fn(cmd: c_uint, data: *mut c_void) -> bool>;
pub type retro_video_refresh_t =
    Option<unsafe extern "C" fn(data: *const c_void, width: c_uint, height: c_uint, pitch: usize)>;
pub type retro_audio_sample_t = Option<unsafe extern "C" fn(left: i16, right: i16)>;
pub type retro_audio_sample_batch_t =
    Option<unsafe extern "C" fn(data: *const i16, frames: usize) -> usize>;
pub type retro_input_poll_t = Option<unsafe extern "C" fn()>;
pub type retro_input_state_t =
    Option<unsafe extern "C" fn(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16>;

/// Variadic printf-style logger handed out via `GET_LOG_INTERFACE`.
pub type retro_log_printf_t =
    Option<unsafe extern "C" fn(level: c_uint, fmt: *const c_char, ...)>;

#[repr(C)]
pub struct retro_log_callback {
    pub log: retro_log_printf_t,
}

#[repr(C)]
pub struct retro_game_info {
    pub path: *const c_char,
    pub data: *const c_void,
    pub size: usize,
    pub meta: *const c_char,
}

#[repr(C)]
pub struct retro_system_info {
    pub library_name: *const c_char,
    pub library_version: *const c_char,
    pub valid_extensions: *const c_char,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct retro_game_geometry {
    pub base_width: c_uint,
    pub base_height: c_uint,
    pub max_width: c_uint,
    pub max_height: c_uint,
    pub aspect_ratio: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct retro_system_timing {
    pub fps: f64,
    pub sample_rate: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct retro_system_av_info {
    pub geometry: retro_game_geometry,
    pub timing: retro_system_timing,
}

// Entry points resolved by name from the loaded core.
pub type retro_init_fn = unsafe extern "C" fn();
pub type retro_deinit_fn = unsafe extern "C" fn();
pub type retro_api_version_fn = unsafe extern "C" fn() -> c_uint;
pub type retro_get_system_info_fn = unsafe extern "C" fn(info: *mut retro_system_info);
pub type retro_get_system_av_info_fn = unsafe extern "C" fn(info: *mut retro_system_av_info);
pub type retro_set_environment_fn = unsafe extern "C" fn(cb: retro_environment_t);
pub type retro_set_video_refresh_fn = unsafe extern "C" fn(cb: retro_video_refresh_t);
pub type retro_set_audio_sample_fn = unsafe extern "C" fn(cb: retro_audio_sample_t);
pub type retro_set_audio_sample_batch_fn = unsafe extern "C" fn(cb: retro_audio_sample_batch_t);
pub type retro_set_input_poll_fn = unsafe extern "C" fn(cb: retro_input_poll_t);
pub type retro_set_input_state_fn = unsafe extern "C" fn(cb: retro_input_state_t);
pub type retro_set_controller_port_device_fn = unsafe extern "C" fn(port: c_uint, device: c_uint);
pub type retro_reset_fn = unsafe extern "C" fn();
pub type retro_run_fn = unsafe extern "C" fn();
pub type retro_serialize_size_fn = unsafe extern "C" fn() -> usize;
pub type retro_serialize_fn = unsafe extern "C" fn(data: *mut c_void, len: usize) -> bool;
pub type retro_unserialize_fn = unsafe extern "C" fn(data: *const c_void, len: usize) -> bool;
pub type retro_load_game_fn = unsafe extern "C" fn(game: *const retro_game_info) -> bool;
pub type retro_unload_game_fn = unsafe extern "C" fn();
pub type retro_get_memory_data_fn = unsafe extern "C" fn(id: c_uint) -> *mut c_void;
pub type retro_get_memory_size_fn = unsafe extern "C" fn(id: c_uint) -> usize;
