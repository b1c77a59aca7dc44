use std::sync::Arc;

use storage_contracts::{CommandLine, CommandRunner, StorageError, VolumeQuery};
use storage_types::{LogicalVolumeState, PhysicalVolumeRef, VolumeGroupState};
use tracing::{debug, error};

use crate::SysError;

/// Tools the reconciler needs on `PATH`
pub const REQUIRED_TOOLS: [&str; 6] = ["vgs", "lvs", "pvs", "lvcreate", "lvextend", "pvresize"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct VgRow {
    name: String,
    extent_size: u64,
    extent_count: u64,
    free_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LvRow {
    vg_name: String,
    lv_name: String,
    lv_path: String,
    size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PvRow {
    pv_name: String,
    vg_name: Option<String>,
    size: u64,
    free: u64,
}

fn parse_tabbed_line(line: &str) -> Vec<String> {
    line.split('\t')
        .map(|part| part.trim().to_string())
        .collect()
}

fn invalid(tool: &str, line: &str) -> SysError {
    SysError::InvalidOutput {
        tool: tool.to_string(),
        line: line.to_string(),
    }
}

fn number(tool: &str, line: &str, value: &str) -> Result<u64, SysError> {
    value.parse().map_err(|_| invalid(tool, line))
}

fn parse_vgs(output: &str) -> Result<Vec<VgRow>, SysError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let cols = parse_tabbed_line(line);
            if cols.len() < 4 {
                return Err(invalid("vgs", line));
            }
            let row = VgRow {
                name: cols[0].clone(),
                extent_size: number("vgs", line, &cols[1])?,
                extent_count: number("vgs", line, &cols[2])?,
                free_count: number("vgs", line, &cols[3])?,
            };
            if row.extent_size == 0 {
                return Err(invalid("vgs", line));
            }
            Ok(row)
        })
        .collect()
}

fn parse_lvs(output: &str) -> Result<Vec<LvRow>, SysError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let cols = parse_tabbed_line(line);
            if cols.len() < 4 {
                return Err(invalid("lvs", line));
            }
            Ok(LvRow {
                vg_name: cols[0].clone(),
                lv_name: cols[1].clone(),
                lv_path: cols[2].clone(),
                size: number("lvs", line, &cols[3])?,
            })
        })
        .collect()
}

fn parse_pvs(output: &str) -> Result<Vec<PvRow>, SysError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let cols = parse_tabbed_line(line);
            if cols.len() < 4 {
                return Err(invalid("pvs", line));
            }
            let vg_name = if cols[1].is_empty() {
                None
            } else {
                Some(cols[1].clone())
            };

            Ok(PvRow {
                pv_name: cols[0].clone(),
                vg_name,
                size: number("pvs", line, &cols[2])?,
                free: number("pvs", line, &cols[3])?,
            })
        })
        .collect()
}

fn groups_from_rows(vgs: Vec<VgRow>, lvs: Vec<LvRow>, pvs: Vec<PvRow>) -> Vec<VolumeGroupState> {
    vgs.into_iter()
        .map(|vg| {
            let logical_volumes = lvs
                .iter()
                .filter(|lv| lv.vg_name == vg.name)
                .map(|lv| LogicalVolumeState {
                    name: lv.lv_name.clone(),
                    size: lv.size,
                    device_path: lv.lv_path.clone(),
                })
                .collect();
            let physical_volumes = pvs
                .iter()
                .filter(|pv| pv.vg_name.as_deref() == Some(vg.name.as_str()))
                .map(|pv| PhysicalVolumeRef {
                    device: pv.pv_name.clone(),
                    size: pv.size,
                    free: pv.free,
                })
                .collect();

            VolumeGroupState {
                name: vg.name,
                extent_size: vg.extent_size,
                extent_count: vg.extent_count,
                free_extents: vg.free_count,
                physical_volumes,
                logical_volumes,
            }
        })
        .collect()
}

fn report_command(tool: &str, fields: &str) -> CommandLine {
    CommandLine::new(tool).args([
        "--noheadings",
        "--units",
        "b",
        "--nosuffix",
        "-o",
        fields,
        "--separator",
        "\t",
    ])
}

/// Live inventory through the LVM reporting tools.
///
/// Every query runs `vgs`, `lvs` and `pvs` afresh.
pub struct LvmTools {
    runner: Arc<dyn CommandRunner>,
}

impl LvmTools {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Fail unless every LVM tool the reconciler runs is installed
    pub fn require_tools() -> Result<(), SysError> {
        if !cfg!(feature = "lvm-tools") {
            return Err(SysError::ToolNotFound(
                "LVM support disabled at compile time".to_string(),
            ));
        }

        for tool in REQUIRED_TOOLS {
            which::which(tool).map_err(|_| SysError::ToolNotFound(tool.to_string()))?;
        }
        Ok(())
    }

    fn report(&self, tool: &str, fields: &str) -> Result<String, StorageError> {
        let command = report_command(tool, fields);
        debug!("Querying {}", command);
        let output = self.runner.run(&command)?;
        if !output.success() {
            error!("{tool} failed: {}", output.stderr.trim_end());
            return Err(StorageError::infrastructure(format!(
                "{tool} failed: {}",
                output.stderr.trim_end()
            )));
        }
        Ok(output.stdout)
    }
}

impl VolumeQuery for LvmTools {
    fn list_volume_groups(&self) -> Result<Vec<VolumeGroupState>, StorageError> {
        let vgs = parse_vgs(&self.report(
            "vgs",
            "vg_name,vg_extent_size,vg_extent_count,vg_free_count",
        )?)?;
        let lvs = parse_lvs(&self.report("lvs", "vg_name,lv_name,lv_path,lv_size")?)?;
        let pvs = parse_pvs(&self.report("pvs", "pv_name,vg_name,pv_size,pv_free")?)?;

        let groups = groups_from_rows(vgs, lvs, pvs);
        debug!("Found {} volume groups", groups.len());
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use storage_contracts::CommandOutput;

    use super::*;

    #[test]
    fn parses_lvm_outputs() {
        let vgs = parse_vgs("  vg0\t4194304\t25599\t1024\n").unwrap();
        let lvs = parse_lvs("  vg0\troot\t/dev/vg0/root\t53687091200\n").unwrap();
        let pvs = parse_pvs("  /dev/sda2\tvg0\t107369988096\t4294967296\n  /dev/sdb\t\t1000\t1000\n")
            .unwrap();

        assert_eq!(vgs.len(), 1);
        assert_eq!(vgs[0].extent_size, 4 * 1024 * 1024);
        assert_eq!(vgs[0].free_count, 1024);
        assert_eq!(lvs[0].lv_name, "root");
        assert_eq!(lvs[0].size, 50 * 1024 * 1024 * 1024);
        assert_eq!(pvs[0].vg_name.as_deref(), Some("vg0"));
        assert_eq!(pvs[1].vg_name, None);
    }

    #[test]
    fn rejects_garbled_rows() {
        assert!(parse_vgs("vg0\t4m\t10\t1\n").is_err());
        assert!(parse_vgs("vg0\t0\t10\t1\n").is_err());
        assert!(parse_lvs("vg0\troot\n").is_err());
    }

    #[test]
    fn builds_groups_from_rows() {
        let groups = groups_from_rows(
            vec![VgRow {
                name: "vg0".to_string(),
                extent_size: 4,
                extent_count: 100,
                free_count: 25,
            }],
            vec![
                LvRow {
                    vg_name: "vg0".to_string(),
                    lv_name: "root".to_string(),
                    lv_path: "/dev/vg0/root".to_string(),
                    size: 300,
                },
                LvRow {
                    vg_name: "vg1".to_string(),
                    lv_name: "other".to_string(),
                    lv_path: "/dev/vg1/other".to_string(),
                    size: 4,
                },
            ],
            vec![
                PvRow {
                    pv_name: "/dev/sda2".to_string(),
                    vg_name: Some("vg0".to_string()),
                    size: 400,
                    free: 100,
                },
                PvRow {
                    pv_name: "/dev/sdb".to_string(),
                    vg_name: None,
                    size: 400,
                    free: 400,
                },
            ],
        );

        assert_eq!(groups.len(), 1);
        let vg0 = &groups[0];
        assert_eq!(vg0.free_extents, 25);
        assert_eq!(vg0.logical_volumes.len(), 1);
        assert_eq!(vg0.logical_volume("root").unwrap().device_path, "/dev/vg0/root");
        assert_eq!(vg0.physical_volumes.len(), 1);
        assert_eq!(vg0.physical_volumes[0].device, "/dev/sda2");
    }

    struct CannedRunner {
        calls: Mutex<Vec<String>>,
        vgs: CommandOutput,
    }

    impl CommandRunner for CannedRunner {
        fn run(&self, command: &CommandLine) -> Result<CommandOutput, StorageError> {
            self.calls.lock().unwrap().push(command.program.clone());
            Ok(match command.program.as_str() {
                "vgs" => self.vgs.clone(),
                "lvs" => CommandOutput {
                    stdout: "  vg0\tdata\t/dev/vg0/data\t419430400\n".to_string(),
                    ..CommandOutput::default()
                },
                _ => CommandOutput {
                    stdout: "  /dev/sdb\tvg0\t1073741824\t654311424\n".to_string(),
                    ..CommandOutput::default()
                },
            })
        }
    }

    #[test]
    fn queries_live_state_on_every_call() {
        let runner = Arc::new(CannedRunner {
            calls: Mutex::new(Vec::new()),
            vgs: CommandOutput {
                stdout: "  vg0\t4194304\t255\t155\n".to_string(),
                ..CommandOutput::default()
            },
        });
        let tools = LvmTools::new(runner.clone());

        let group = tools.get_volume_group("vg0").unwrap().unwrap();
        assert_eq!(group.logical_volume("data").unwrap().size, 419430400);
        assert!(tools.get_volume_group("vg9").unwrap().is_none());
        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec!["vgs", "lvs", "pvs", "vgs", "lvs", "pvs"]
        );
    }

    #[test]
    fn tool_failure_is_an_infrastructure_error() {
        let runner = Arc::new(CannedRunner {
            calls: Mutex::new(Vec::new()),
            vgs: CommandOutput {
                stdout: String::new(),
                stderr: "  /dev/mapper/control: open failed: Permission denied\n".to_string(),
                exit_code: 5,
            },
        });
        let error = LvmTools::new(runner).list_volume_groups().unwrap_err();
        assert!(matches!(error, StorageError::Infrastructure { .. }));
        assert!(error.to_string().contains("Permission denied"));
    }

    #[test]
    fn report_command_requests_bytes() {
        assert_eq!(
            report_command("vgs", "vg_name").to_string(),
            "vgs --noheadings --units b --nosuffix -o vg_name --separator \t"
        );
    }
}
