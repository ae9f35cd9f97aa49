use std::env;
use std::path::PathBuf;

const WATCHED: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in WATCHED {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // Only the FFmpeg source links native libraries, and only Windows needs help finding them.
    let wants_ffmpeg = env::var_os("CARGO_FEATURE_FFMPEG").is_some();
    let on_windows = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if !wants_ffmpeg || !on_windows || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    for hint in vcpkg_hints() {
        println!("cargo:warning={hint}");
    }
}

fn vcpkg_hints() -> Vec<String> {
    let Ok(root) = env::var("VCPKG_ROOT") else {
        return vec![
            "video2ppt: the `ffmpeg` feature needs FFmpeg; install it with vcpkg and set FFMPEG_DIR"
                .to_string(),
        ];
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install = PathBuf::from(root).join("installed").join(triplet);
    if !install.exists() {
        return vec![format!(
            "video2ppt: no vcpkg FFmpeg under {}",
            install.display()
        )];
    }

    let mut hints = vec![format!(
        "video2ppt: found vcpkg FFmpeg, set FFMPEG_DIR={}",
        install.display()
    )];
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        hints.push("video2ppt: set VCPKGRS_DYNAMIC=1 for dynamic vcpkg builds".to_string());
    }
    hints
}
