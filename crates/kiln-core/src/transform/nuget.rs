//! Repackage a `.nupkg` as a native package.
//!
//! The nupkg is extracted with the host `unzip`, a framework folder is picked
//! under `lib/`, and a `package.toml` descriptor plus a `module.toml` are
//! written next to the contents before everything is packed as `tar/lzma`.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use kiln_schema::{ArchiveFormat, ModuleManifest};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{NuGetSource, TransformError};
use crate::creator;
use crate::filter::FileFilter;
use crate::io::download;
use crate::io::tool::find_tool;
use crate::reporter::Reporter;

/// Name of the descriptor written into transformed packages.
pub const DESCRIPTOR: &str = "package.toml";

/// Files of the nupkg container itself, never packed.
const CONTAINER_FILES: [&str; 4] = [
    r"^\[Content_Types\]\.xml$",
    r"^_rels/",
    r"^package/",
    r"\.nuspec$",
];

const GENERIC_FRAMEWORKS: &[&str] = &[
    "net8.0",
    "net7.0",
    "net6.0",
    "net5.0",
    "netstandard2.1",
    "netstandard2.0",
    "net48",
    "net472",
    "net471",
    "net47",
    "net462",
    "net461",
    "net46",
    "net452",
    "net451",
    "net45",
    "netstandard1.6",
    "netstandard1.3",
    "netstandard1.1",
    "netstandard1.0",
    "net40",
    "net35",
    "net20",
    "portable-",
];

/// Contents of `package.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NuGetDescriptor {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    /// Assemblies to reference, relative to the package root.
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VersionList {
    #[serde(default)]
    versions: Vec<String>,
}

/// Framework monikers to try for `platform`, most preferred first.
pub fn framework_preferences(platform: &str) -> Vec<&'static str> {
    let specific: &[&str] = match platform.to_ascii_lowercase().as_str() {
        "android" => &["net8.0-android", "net6.0-android", "monoandroid", "xamarinandroid"],
        "ios" => &["net8.0-ios", "net6.0-ios", "xamarinios", "monotouch"],
        "macos" => &["net8.0-macos", "xamarinmac"],
        "windows" => &["net8.0-windows", "net6.0-windows"],
        _ => &[],
    };
    specific.iter().chain(GENERIC_FRAMEWORKS).copied().collect()
}

/// Pick a framework folder: exact matches in preference order first, then
/// the first folder containing a preferred moniker.
pub fn detect_framework(available: &[String], preferences: &[&str]) -> Option<String> {
    let lowered: Vec<String> = available.iter().map(|a| a.to_ascii_lowercase()).collect();

    for pref in preferences {
        if let Some(idx) = lowered.iter().position(|a| a == pref) {
            return Some(available[idx].clone());
        }
    }
    for pref in preferences {
        if let Some(idx) = lowered.iter().position(|a| a.contains(pref)) {
            return Some(available[idx].clone());
        }
    }
    None
}

/// Order two version strings: semver when both parse, numeric components
/// otherwise.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => numeric_parts(a).cmp(&numeric_parts(b)),
    }
}

fn numeric_parts(version: &str) -> Vec<u64> {
    version
        .split(['.', '-', '+'])
        .map_while(|p| p.parse().ok())
        .collect()
}

/// Highest stable version, or the highest prerelease if nothing is stable.
pub fn latest_version(versions: &[String]) -> Option<&String> {
    let newest = |stable: bool| {
        versions
            .iter()
            .filter(|v| !stable || !v.contains('-'))
            .max_by(|a, b| compare_versions(a, b))
    };
    newest(true).or_else(|| newest(false))
}

async fn resolve_version(
    source: &NuGetSource,
    client: &Client,
    requested: &str,
    reporter: &dyn Reporter,
) -> Result<String, TransformError> {
    let requested = requested.trim();
    if !requested.is_empty() && !requested.eq_ignore_ascii_case("latest") {
        return Ok(requested.to_string());
    }

    let url = format!(
        "{}/{}/index.json",
        source.base_address,
        source.package_id.to_lowercase()
    );
    let list: VersionList = download::fetch_json(client, &url, reporter).await?;
    latest_version(&list.versions)
        .cloned()
        .ok_or_else(|| TransformError::NoVersions {
            package_id: source.package_id.clone(),
        })
}

pub async fn transform(
    source: &NuGetSource,
    client: &Client,
    version: &str,
    platform: &str,
    reporter: &dyn Reporter,
) -> Result<(Vec<u8>, ArchiveFormat), TransformError> {
    let version = resolve_version(source, client, version, reporter).await?;
    let id = source.package_id.to_lowercase();
    let ver = version.to_lowercase();
    let url = format!("{}/{id}/{ver}/{id}.{ver}.nupkg", source.base_address);

    tracing::info!("Transforming {} {version} for {platform}", source.package_id);
    let nupkg = download::fetch_bytes(client, &url, reporter).await?;

    let work = tempfile::tempdir()?;
    let nupkg_path = work.path().join(format!("{id}.{ver}.nupkg"));
    let root = work.path().join("package");
    fs::create_dir_all(&root)?;
    fs::write(&nupkg_path, &nupkg)?;

    let extracted = unzip(&nupkg_path, &root)?;
    if !extracted {
        reporter.warning(&format!(
            "unzip is not available; {} will have no referenceable binaries",
            source.package_id
        ));
    }

    let descriptor = describe(&root, &source.package_id, &version, platform)?;
    fs::write(root.join(DESCRIPTOR), toml::to_string_pretty(&descriptor)?)?;
    ModuleManifest {
        name: source.package_id.clone(),
        packages: Vec::new(),
    }
    .save(&root)?;

    let bytes = pack(&root)?;
    Ok((bytes, ArchiveFormat::TarLzma))
}

/// Extract `nupkg` into `dest`. Returns `false` when `unzip` is not installed.
fn unzip(nupkg: &Path, dest: &Path) -> Result<bool, TransformError> {
    let tool = match find_tool("unzip") {
        Ok(tool) => tool,
        Err(e) => {
            tracing::warn!("{e}");
            return Ok(false);
        }
    };

    let output = Command::new(tool)
        .arg("-qq")
        .arg("-o")
        .arg(nupkg)
        .arg("-d")
        .arg(dest)
        .stdin(Stdio::null())
        .output()?;

    // Exit code 1 only reports warnings.
    match output.status.code() {
        Some(0 | 1) => Ok(true),
        _ => Err(TransformError::Unzip {
            package: nupkg.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Build the descriptor for an extracted package at `root`.
pub fn describe(
    root: &Path,
    id: &str,
    version: &str,
    platform: &str,
) -> Result<NuGetDescriptor, TransformError> {
    let lib = root.join("lib");
    let available = subdirectories(&lib)?;
    let framework = detect_framework(&available, &framework_preferences(platform));

    let references = match &framework {
        Some(fw) => assemblies(&lib.join(fw))?
            .into_iter()
            .map(|name| format!("lib/{fw}/{name}"))
            .collect(),
        None => {
            tracing::debug!("No usable framework folder for {id} on {platform}");
            Vec::new()
        }
    };

    Ok(NuGetDescriptor {
        id: id.to_string(),
        version: version.to_string(),
        framework,
        references,
    })
}

fn subdirectories(dir: &Path) -> std::io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

fn assemblies(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.to_ascii_lowercase().ends_with(".dll"))
        .collect();
    names.sort();
    Ok(names)
}

fn pack(root: &Path) -> Result<Vec<u8>, TransformError> {
    let mut filter = FileFilter::new(root)?;
    filter.include(".*")?;
    for pattern in CONTAINER_FILES {
        filter.exclude(pattern)?;
    }
    filter.imply_directories();

    let mut out = Vec::new();
    creator::create_with_format(&mut out, filter.mapping(), root, ArchiveFormat::TarLzma)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn exact_match_beats_substring() {
        let available = names(&["net45", "netstandard2.0", "portable-net45+win8"]);
        let prefs = framework_preferences("Linux");
        assert_eq!(
            detect_framework(&available, &prefs).as_deref(),
            Some("netstandard2.0")
        );
    }

    #[test]
    fn substring_match_is_the_fallback() {
        let available = names(&["portable-net45+win8+wpa81"]);
        assert_eq!(
            detect_framework(&available, &framework_preferences("Linux")).as_deref(),
            Some("portable-net45+win8+wpa81")
        );
        assert_eq!(detect_framework(&names(&["sl5"]), &["net45"]), None);
    }

    #[test]
    fn platform_monikers_come_first() {
        let available = names(&["netstandard2.0", "MonoAndroid"]);
        assert_eq!(
            detect_framework(&available, &framework_preferences("Android")).as_deref(),
            Some("MonoAndroid")
        );
    }

    #[test]
    fn version_ordering() {
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.2.3.4", "1.2.3"), Ordering::Greater);
        assert_eq!(compare_versions("2.0.0-beta", "2.0.0"), Ordering::Less);

        let versions = names(&["1.0.0", "13.0.1", "13.0.2-beta1", "9.0.1"]);
        assert_eq!(latest_version(&versions).map(String::as_str), Some("13.0.1"));
        let pre = names(&["1.0.0-alpha", "1.0.0-beta"]);
        assert_eq!(latest_version(&pre).map(String::as_str), Some("1.0.0-beta"));
        assert_eq!(latest_version(&[]), None);
    }

    #[test]
    fn describe_lists_assemblies_of_chosen_framework() {
        let dir = tempdir().unwrap();
        let fw = dir.path().join("lib/netstandard2.0");
        fs::create_dir_all(&fw).unwrap();
        fs::write(fw.join("Demo.dll"), "x").unwrap();
        fs::write(fw.join("Demo.xml"), "docs").unwrap();
        fs::create_dir_all(dir.path().join("lib/net20")).unwrap();

        let d = describe(dir.path(), "Demo", "1.0.0", "Linux").unwrap();
        assert_eq!(d.framework.as_deref(), Some("netstandard2.0"));
        assert_eq!(d.references, vec!["lib/netstandard2.0/Demo.dll"]);
    }

    #[test]
    fn missing_lib_degrades_to_no_references() {
        let dir = tempdir().unwrap();
        let d = describe(dir.path(), "Tools.Only", "2.0.0", "Windows").unwrap();
        assert_eq!(d.framework, None);
        assert!(d.references.is_empty());
    }

    #[test]
    fn pack_skips_container_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("_rels")).unwrap();
        fs::write(dir.path().join("_rels/.rels"), "x").unwrap();
        fs::write(dir.path().join("[Content_Types].xml"), "x").unwrap();
        fs::write(dir.path().join("Demo.nuspec"), "x").unwrap();
        fs::create_dir_all(dir.path().join("lib/net45")).unwrap();
        fs::write(dir.path().join("lib/net45/Demo.dll"), "dll").unwrap();

        let bytes = pack(dir.path()).unwrap();
        let tar = crate::archive::decompress(ArchiveFormat::TarLzma, &bytes).unwrap();
        let mut paths = Vec::new();
        crate::archive::read_entries(&tar[..], |e| {
            if let crate::archive::ArchiveEntry::File { path, .. } = e {
                paths.push(path);
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(paths, vec!["lib/net45/Demo.dll"]);
    }
}
