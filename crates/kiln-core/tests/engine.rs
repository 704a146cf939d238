use std::fs;
use std::path::Path;
use std::sync::Arc;

use kiln_core::archive::{self, ArchiveEntry, read_entries};
use kiln_core::cache::PackageCache;
use kiln_core::creator;
use kiln_core::filter::{FileFilter, FileFilterMapping};
use kiln_core::io::download::build_client;
use kiln_core::locator;
use kiln_core::lookup::PackageLookup;
use kiln_core::redup::Reduplicator;
use kiln_core::retrieval::PackageRetrieval;
use kiln_core::{CacheDir, NullReporter, Redirector, RetryPolicy};
use kiln_schema::{ArchiveFormat, CacheKey, ModuleManifest, PackageRef};
use tempfile::tempdir;

fn write(root: &Path, rel: &str, body: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn entries(format: ArchiveFormat, bytes: &[u8]) -> Vec<ArchiveEntry> {
    let tar = archive::decompress(format, bytes).unwrap();
    let mut out = Vec::new();
    read_entries(&tar[..], |e| {
        out.push(e);
        Ok(())
    })
    .unwrap();
    out
}

#[test]
fn pack_and_unpack_roundtrip_both_formats() {
    for format in [ArchiveFormat::TarGzip, ArchiveFormat::TarLzma] {
        let src = tempdir().unwrap();
        write(src.path(), "bin/App.dll", b"assembly");
        write(src.path(), "bin/App.xml", b"docs");
        write(src.path(), "content/deep/path/data.bin", &[0u8, 1, 2, 255]);

        let filter = FileFilter::from_rules(src.path(), "include .*\n").unwrap();
        let mut packed = Vec::new();
        creator::create(&mut packed, filter.mapping(), src.path(), format.tag()).unwrap();

        let out = tempdir().unwrap();
        Reduplicator::new(out.path())
            .extract_archive(format, &packed)
            .unwrap();

        for rel in ["bin/App.dll", "bin/App.xml", "content/deep/path/data.bin"] {
            assert_eq!(
                fs::read(out.path().join(rel)).unwrap(),
                fs::read(src.path().join(rel)).unwrap(),
                "{rel} differs after {format} roundtrip"
            );
        }
    }
}

#[test]
fn identical_files_are_stored_once() {
    let src = tempdir().unwrap();
    let payload = vec![0x5au8; 4096];
    write(src.path(), "a/x.dll", &payload);
    write(src.path(), "b/x.dll", &payload);
    write(src.path(), "c/readme.txt", b"hello");

    let mut mapping = FileFilterMapping::new();
    for rel in ["a/x.dll", "b/x.dll", "c/readme.txt"] {
        mapping.insert(rel, rel);
    }

    let mut packed = Vec::new();
    let summary = creator::create(&mut packed, &mapping, src.path(), "tar/lzma").unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.links, 1);

    let found = entries(ArchiveFormat::TarLzma, &packed);
    assert_eq!(
        found,
        vec![
            ArchiveEntry::File {
                path: "a/x.dll".to_string(),
                data: payload.clone()
            },
            ArchiveEntry::HardLink {
                path: "b/x.dll".to_string(),
                target: "a/x.dll".to_string()
            },
            ArchiveEntry::File {
                path: "c/readme.txt".to_string(),
                data: b"hello".to_vec()
            },
        ]
    );

    let out = tempdir().unwrap();
    Reduplicator::new(out.path())
        .extract_archive(ArchiveFormat::TarLzma, &packed)
        .unwrap();
    assert_eq!(fs::read(out.path().join("b/x.dll")).unwrap(), payload);
}

#[tokio::test]
async fn binary_is_downloaded_once_then_served_from_cache() {
    let mut server = mockito::Server::new_async().await;

    let src = tempdir().unwrap();
    write(src.path(), "lib/Lib.dll", b"binary");
    let mut mapping = FileFilterMapping::new();
    mapping.insert("lib/Lib.dll", "lib/Lib.dll");
    let mut archive_bytes = Vec::new();
    creator::create(&mut archive_bytes, &mapping, src.path(), "tar/lzma").unwrap();

    let index = server
        .mock("GET", "/lib")
        .match_query(mockito::Matcher::UrlEncoded("json".into(), "true".into()))
        .with_body(format!(
            r#"{{"has_error":false,"result":{{"type":"library","gitUrl":"https://g/lib.git",
              "versions":[{{"versionName":"v1","platformName":"Linux",
                "downloadUrl":"{}/blobs/v1-Linux.tar.lzma","archiveType":"tar/lzma"}}],
              "branches":[]}}}}"#,
            server.url()
        ))
        .expect(1)
        .create_async()
        .await;
    let blob = server
        .mock("GET", "/blobs/v1-Linux.tar.lzma")
        .with_body(archive_bytes.clone())
        .expect(1)
        .create_async()
        .await;

    let cache_dir = tempdir().unwrap();
    let lookup = PackageLookup::new(
        build_client(kiln_core::USER_AGENT).unwrap(),
        CacheDir::at(cache_dir.path()),
        Redirector::in_memory(),
    );
    let cache = PackageCache::new(
        CacheDir::at(cache_dir.path()),
        PackageRetrieval::new(Arc::new(lookup)),
        RetryPolicy::immediate(3),
    );

    let uri = format!("{}/lib", server.url());
    let (first, format) = cache
        .get_binary_package(&uri, "v1", "Linux", &NullReporter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(format, ArchiveFormat::TarLzma);
    assert_eq!(first, archive_bytes);

    let entry = cache_dir
        .path()
        .join(CacheKey::binary(&uri, "v1", "Linux").file_name(ArchiveFormat::TarLzma));
    assert!(entry.is_file());
    assert!(cache.has_binary_package(&uri, "v1", "Linux"));
    let leftovers: Vec<_> = std::fs::read_dir(cache_dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");

    let (second, _) = cache
        .get_binary_package(&uri, "v1", "Linux", &NullReporter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, first);

    index.assert_async().await;
    blob.assert_async().await;
}

#[test]
fn earlier_sibling_copy_is_found_but_not_later() {
    let root = tempdir().unwrap();
    let pkg = PackageRef::new("https-git://example.com/shared.git", "master", "Shared");

    let module = |dir: &Path, name: &str| {
        fs::create_dir_all(dir).unwrap();
        ModuleManifest {
            name: name.to_string(),
            packages: vec![pkg.clone()],
        }
        .save(dir)
        .unwrap();
        fs::create_dir_all(dir.join("Shared/.git")).unwrap();
    };
    ModuleManifest {
        name: "root".to_string(),
        packages: vec![],
    }
    .save(root.path())
    .unwrap();
    let alpha = root.path().join("alpha");
    let beta = root.path().join("beta");
    module(&alpha, "alpha");
    module(&beta, "beta");

    let from_beta = locator::discover(&beta, &pkg).unwrap();
    assert_eq!(
        from_beta,
        Some(alpha.canonicalize().unwrap().join("Shared"))
    );

    assert_eq!(locator::discover(&alpha, &pkg).unwrap(), None);
}

#[test]
fn override_beats_persisted_redirect() {
    let tmp = tempdir().unwrap();
    let cache = CacheDir::at(tmp.path());
    let mut redirector = Redirector::new(cache.redirects_file());
    redirector
        .add_persistent("https-git://a/lib.git", "https-git://mirror/lib.git")
        .unwrap();
    assert_eq!(
        redirector.redirect("https-git://a/lib.git"),
        "https-git://mirror/lib.git"
    );

    redirector.register("https-git://a/lib.git", "local-folder:///opt/lib");
    assert_eq!(
        redirector.redirect("https-git://a/lib.git"),
        "local-folder:///opt/lib"
    );
}
