// storage.rs

use std::{ffi::CString, ptr};

use esp_idf_sys::esp;

use crate::*;

const MAX_FILES: usize = 5;

/// Mounts the SPIFFS data partition so `FileStore` can use it through std::fs.
pub fn mount_spiffs(base_path: &str) -> anyhow::Result<()> {
    let path = CString::new(base_path)?;

    #[allow(clippy::needless_update)]
    let conf = esp_idf_sys::esp_vfs_spiffs_conf_t {
        base_path: path.as_ptr(),
        partition_label: ptr::null(),
        max_files: MAX_FILES as _,
        format_if_mount_failed: true,
        ..Default::default()
    };
    esp! { unsafe { esp_idf_sys::esp_vfs_spiffs_register(&conf) } }?;

    let (mut total, mut used) = (0, 0);
    esp! { unsafe { esp_idf_sys::esp_spiffs_info(ptr::null(), &mut total, &mut used) } }?;
    info!("SPIFFS mounted at {base_path}: {used}/{total} bytes used");
    Ok(())
}

// EOF
