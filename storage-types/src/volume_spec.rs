//! Declared logical volume intent
//!
//! One `DesiredVolumeSpec` describes a single logical volume: where it lives,
//! how big it should be, how it is laid out, and optionally how it is
//! formatted and mounted. It is immutable for one reconciliation pass.

use serde::{Deserialize, Deserializer, Serialize};

use crate::lvm::to_dm_name;
use crate::size::{SizeParseError, SizeSpec};

/// Desired state of one logical volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredVolumeSpec {
    /// Volume group that must already exist
    pub group: String,

    /// Logical volume name
    pub name: String,

    /// Raw size token, see [`SizeSpec`]
    pub size: String,

    #[serde(default)]
    pub stripes: Option<u32>,

    /// Passed to `--stripesize` as given (e.g. `64` or `64k`)
    #[serde(default, deserialize_with = "string_or_number")]
    pub stripe_size: Option<String>,

    #[serde(default)]
    pub mirrors: Option<u32>,

    #[serde(default)]
    pub contiguous: bool,

    /// Passed to `--readahead` as given (`auto`, `none` or a sector count)
    #[serde(default, deserialize_with = "string_or_number")]
    pub readahead: Option<String>,

    /// Filesystem type to create on the volume, e.g. `ext4`
    #[serde(default)]
    pub filesystem: Option<String>,

    #[serde(default)]
    pub mount_point: Option<MountPoint>,

    /// Allow physical volume resize and logical volume extend
    #[serde(default)]
    pub resize: bool,

    /// Devices to allocate the volume from when it is created
    #[serde(default)]
    pub physical_volumes: PhysicalVolumeHints,
}

impl DesiredVolumeSpec {
    pub fn new(group: impl Into<String>, name: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            size: size.into(),
            stripes: None,
            stripe_size: None,
            mirrors: None,
            contiguous: false,
            readahead: None,
            filesystem: None,
            mount_point: None,
            resize: false,
            physical_volumes: PhysicalVolumeHints::default(),
        }
    }

    /// Short `group/name` identifier used in logs and reports
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.group, self.name)
    }

    pub fn size_spec(&self) -> Result<SizeSpec, SizeParseError> {
        SizeSpec::parse(&self.size)
    }

    /// Device-mapper node of the volume, e.g. `/dev/mapper/my--vg-data`
    pub fn device_mapper_path(&self) -> String {
        format!(
            "/dev/mapper/{}-{}",
            to_dm_name(&self.group),
            to_dm_name(&self.name)
        )
    }
}

/// Ordered list of physical volume devices, written as a single string or
/// an array in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PhysicalVolumeHints(pub Vec<String>);

impl PhysicalVolumeHints {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for PhysicalVolumeHints {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(device) => Self(vec![device]),
            Raw::Many(devices) => Self(devices),
        })
    }
}

/// Mount target, either a bare directory or a full mount description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MountPoint {
    Location(String),
    Spec(MountSpec),
}

impl MountPoint {
    /// Full mount description, with the location's trailing `/` removed
    pub fn spec(&self) -> MountSpec {
        let mut spec = match self {
            Self::Location(location) => MountSpec {
                location: location.clone(),
                options: None,
                dump: None,
                pass: None,
            },
            Self::Spec(spec) => spec.clone(),
        };
        spec.location = spec.trimmed_location().to_string();
        spec
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountSpec {
    /// Directory to mount on
    pub location: String,

    /// Comma-separated mount options
    #[serde(default)]
    pub options: Option<String>,

    /// fstab dump field
    #[serde(default)]
    pub dump: Option<u32>,

    /// fstab pass field
    #[serde(default)]
    pub pass: Option<u32>,
}

impl MountSpec {
    /// Location as the kernel reports it: `/srv/data/` is `/srv/data`
    pub fn trimmed_location(&self) -> &str {
        let trimmed = self.location.trim_end_matches('/');
        if trimmed.is_empty() && self.location.starts_with('/') {
            "/"
        } else {
            trimmed
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}
