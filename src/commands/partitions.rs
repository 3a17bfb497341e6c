//! partitions command implementation

use std::fmt::Write;

use pflash_core::error::Result;
use pflash_core::{Descriptor, PartitionPlanner, ProjectPaths};

/// Print the resolved partition table of a project
pub fn run_partitions(paths: ProjectPaths) -> Result<()> {
    let planner = PartitionPlanner::new(paths);
    let descriptor = planner.descriptor()?;
    print!("{}", format_partitions(&descriptor, planner.paths()));
    Ok(())
}

fn format_partitions(descriptor: &Descriptor, paths: &ProjectPaths) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Project:    {}", paths.project());
    let _ = writeln!(out, "Descriptor: {}", descriptor.path.display());
    let _ = writeln!(out, "Images:     {}", paths.image_dir().display());

    for device in &descriptor.devices {
        let _ = writeln!(
            out,
            "\n{} ({}, block size {:#x}, padding {:#04x}):",
            device.name,
            super::format_size(device.size),
            device.block_size,
            device.padding_byte
        );
        let _ = writeln!(
            out,
            "{:<16} {:>12} {:>12} {:>10}  {}",
            "Name", "Offset", "End", "Size", "Image"
        );
        let _ = writeln!(out, "{:-<80}", "");

        for part in &device.partitions {
            let size = part.size.unwrap_or(0);
            let image = paths.image_dir().join(&part.filename);
            let _ = writeln!(
                out,
                "{:<16} {:#012x} {:#012x} {:>10}  {}{}",
                part.name,
                part.offset,
                part.offset.saturating_add(size),
                super::format_size(size),
                part.filename,
                if image.is_file() { "" } else { " (missing)" }
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const NVM: &str = r#"
flash0:
  size: 0x1000000
  block_size: 0x10000
  padding_byte: 0xff
  partitions:
    - name: plo
      offs: 0x0
    - name: kernel
      offs: 0x20000
    - name: rootfs
      offs: 0x100000
"#;

    #[test]
    fn test_partition_table() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path(), "armv7a9-zynq7000-zedboard");
        fs::create_dir_all(paths.image_dir()).unwrap();
        fs::write(paths.image_dir().join("part_flash0_kernel.img"), [0u8; 16]).unwrap();

        let descriptor = Descriptor::from_yaml_str(NVM, paths.descriptor_path()).unwrap();
        let table = format_partitions(&descriptor, &paths);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "Project:    armv7a9-zynq7000-zedboard");
        assert!(lines.contains(&"flash0 (16 MiB, block size 0x10000, padding 0xff):"));
        assert!(lines.contains(
            &"plo              0x0000000000 0x0000020000    128 KiB  part_flash0_plo.img (missing)"
        ));
        assert!(lines.contains(
            &"kernel           0x0000020000 0x0000100000    896 KiB  part_flash0_kernel.img"
        ));
        assert!(lines.contains(
            &"rootfs           0x0000100000 0x0001000000     15 MiB  part_flash0_rootfs.img (missing)"
        ));
    }
}
