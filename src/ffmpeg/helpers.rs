//! Safe wrappers around FFmpeg FFI calls.
//!
//! All `unsafe` blocks the segmenter needs for raw `AVFormatContext` and
//! `AVCodecParameters` access live here, each with its safety argument.

use ffmpeg_next as ffmpeg;
use std::ffi::CString;
use std::path::Path;

use crate::error::FfmpegError;

/// Zero out `codec_tag` on the `AVCodecParameters` attached to an output
/// stream, so the muxer picks the correct tag for the target container.
///
/// Must be called after `out_stream.set_parameters(...)` and before
/// `write_header`.
pub fn stream_reset_codec_tag(out_stream: &mut ffmpeg::format::stream::StreamMut) {
    // SAFETY: `out_stream.as_mut_ptr()` is valid for the lifetime of the
    // stream. `codecpar` is set by `set_parameters` and is non-null.
    unsafe {
        (*(*out_stream.as_mut_ptr()).codecpar).codec_tag = 0;
    }
}

/// Allocate an output context for `format_name` without opening any file.
///
/// The returned context has a null `pb`; use [`avio_open`] to attach a file.
pub fn alloc_output_context(
    format_name: &str,
) -> Result<ffmpeg::format::context::Output, FfmpegError> {
    let format = CString::new(format_name)
        .map_err(|_| FfmpegError::MuxerCreate(format!("invalid format name {:?}", format_name)))?;
    let mut ctx: *mut ffmpeg::ffi::AVFormatContext = std::ptr::null_mut();

    // SAFETY: `ctx` is a valid out-pointer; a null oformat and filename are
    // accepted when the format name is given.
    let ret = unsafe {
        ffmpeg::ffi::avformat_alloc_output_context2(
            &mut ctx,
            std::ptr::null_mut(),
            format.as_ptr(),
            std::ptr::null(),
        )
    };
    if ret < 0 || ctx.is_null() {
        return Err(FfmpegError::MuxerCreate(format!(
            "avformat_alloc_output_context2({}) failed: {}",
            format_name,
            ffmpeg::Error::from(ret)
        )));
    }

    // SAFETY: `ctx` is a freshly allocated, non-null output context that
    // nothing else owns.
    Ok(unsafe { ffmpeg::format::context::Output::wrap(ctx) })
}

/// Open `path` for writing and attach it as the context's `pb`.
pub fn avio_open(
    output: &mut ffmpeg::format::context::Output,
    path: &Path,
) -> Result<(), FfmpegError> {
    let url = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| FfmpegError::OpenOutput(format!("invalid path {:?}", path)))?;

    // SAFETY: the context pointer is valid for the lifetime of `output` and
    // `pb` is a plain field we own. Callers close any previous `pb` first.
    let ret = unsafe {
        let ctx = output.as_mut_ptr();
        ffmpeg::ffi::avio_open(
            &mut (*ctx).pb,
            url.as_ptr(),
            ffmpeg::ffi::AVIO_FLAG_WRITE as i32,
        )
    };
    if ret < 0 {
        return Err(FfmpegError::OpenOutput(format!(
            "{:?}: {}",
            path,
            ffmpeg::Error::from(ret)
        )));
    }
    Ok(())
}

/// Whether the context currently has an open `pb`.
pub fn avio_is_open(output: &mut ffmpeg::format::context::Output) -> bool {
    // SAFETY: reading a pointer field of a valid context.
    unsafe { !(*output.as_mut_ptr()).pb.is_null() }
}

/// Flush and close the context's `pb`, leaving it null.
pub fn avio_close(output: &mut ffmpeg::format::context::Output) -> Result<(), FfmpegError> {
    // SAFETY: `avio_closep` accepts a null `pb` and resets the field to null,
    // so the `Output` drop glue will not close it a second time.
    let ret = unsafe { ffmpeg::ffi::avio_closep(&mut (*output.as_mut_ptr()).pb) };
    if ret < 0 {
        return Err(FfmpegError::WriteError(format!(
            "avio_closep failed: {}",
            ffmpeg::Error::from(ret)
        )));
    }
    Ok(())
}

/// Drain the interleaving queue and the muxer's own buffers, then flush the
/// AVIO buffer of the open `pb`.
pub fn flush_muxer(output: &mut ffmpeg::format::context::Output) -> Result<(), FfmpegError> {
    // SAFETY: a null packet is the documented flush request for both calls.
    // `avio_flush` is only reached with a non-null `pb`.
    unsafe {
        let ctx = output.as_mut_ptr();
        let ret = ffmpeg::ffi::av_interleaved_write_frame(ctx, std::ptr::null_mut());
        if ret < 0 {
            return Err(FfmpegError::WriteError(format!(
                "interleave flush failed: {}",
                ffmpeg::Error::from(ret)
            )));
        }
        let ret = ffmpeg::ffi::av_write_frame(ctx, std::ptr::null_mut());
        if ret < 0 {
            return Err(FfmpegError::WriteError(format!(
                "muxer flush failed: {}",
                ffmpeg::Error::from(ret)
            )));
        }
        if !(*ctx).pb.is_null() {
            ffmpeg::ffi::avio_flush((*ctx).pb);
        }
    }
    Ok(())
}

/// Set a private option of the context's muxer (e.g. `mpegts_flags`).
pub fn set_muxer_option(
    output: &mut ffmpeg::format::context::Output,
    name: &str,
    value: &str,
) -> Result<(), FfmpegError> {
    let c_name = CString::new(name)
        .map_err(|_| FfmpegError::StreamConfig(format!("invalid option name {:?}", name)))?;
    let c_value = CString::new(value)
        .map_err(|_| FfmpegError::StreamConfig(format!("invalid option value {:?}", value)))?;

    // SAFETY: `priv_data` is allocated by avformat_alloc_output_context2 for
    // muxers with private options and stays valid for the context lifetime.
    let ret = unsafe {
        let ctx = output.as_mut_ptr();
        if (*ctx).priv_data.is_null() {
            return Err(FfmpegError::StreamConfig(
                "muxer has no private options".to_string(),
            ));
        }
        ffmpeg::ffi::av_opt_set((*ctx).priv_data, c_name.as_ptr(), c_value.as_ptr(), 0)
    };
    if ret < 0 {
        return Err(FfmpegError::StreamConfig(format!(
            "failed to set {}={}: {}",
            name,
            value,
            ffmpeg::Error::from(ret)
        )));
    }
    Ok(())
}

/// Convert a timestamp to seconds
pub fn ts_to_seconds(ts: i64, timebase: ffmpeg::Rational) -> f64 {
    let num = timebase.numerator() as f64;
    let den = timebase.denominator() as f64;
    if den == 0.0 {
        return 0.0;
    }
    (ts as f64 * num) / den
}
