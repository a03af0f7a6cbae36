// tests/assembly.rs

//! End-to-end assembly tests: every run goes from synthetic input jars to
//! a written output archive.

mod common;

use common::{config_with, module, read_jar, write_jar, ClassFile};
use jarforge::archive::MANIFEST_PATH;
use jarforge::config::AssemblyConfig;
use jarforge::manifest::Manifest;
use jarforge::relocate::classfile::utf8_constants;
use jarforge::{Assembler, EntryFate, Error, RelocationRule};
use std::collections::BTreeSet;

fn widget_rule() -> RelocationRule {
    RelocationRule::new("com.example.lib", "bundled.lib")
}

/// An application jar referencing a library type, and the library jar
fn app_and_lib(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let main = ClassFile::new("com/example/app/Main")
        .reference("com/example/lib/Widget")
        .field("widget", "Lcom/example/lib/Widget;")
        .literal("com.example.lib.Widget")
        .build();
    let app = write_jar(
        &dir.join("app.jar"),
        &[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n\r\n"),
            ("com/example/app/Main.class", &main),
        ],
    );

    let widget = ClassFile::new("com/example/lib/Widget").build();
    let widget_impl = ClassFile::new("com/example/lib/WidgetImpl")
        .reference("com/example/lib/Widget")
        .build();
    let lib = write_jar(
        &dir.join("lib.jar"),
        &[
            ("com/example/lib/", b""),
            ("com/example/lib/Widget.class", &widget),
            ("com/example/lib/WidgetImpl.class", &widget_impl),
            ("META-INF/services/com.example.lib.Widget", b"# widgets\ncom.example.lib.WidgetImpl\n"),
            ("META-INF/LIB.SF", b"signature"),
        ],
    );
    (app, lib)
}

#[test]
fn test_relocation_in_bytecode_and_service_files() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path());

    let mut config = config_with(vec![
        module("com.example:app:1.0", app),
        module("com.example:lib:2.0", lib),
    ]);
    config.relocations.push(widget_rule());

    let dest = dir.path().join("out.jar");
    Assembler::new(config).assemble(&dest).unwrap();
    let (files, _) = read_jar(&dest);

    // Class paths move with their package
    assert!(files.contains_key("bundled/lib/Widget.class"));
    assert!(files.contains_key("bundled/lib/WidgetImpl.class"));
    assert!(!files.contains_key("com/example/lib/Widget.class"));

    // Type references are rewritten, the string literal is not
    let constants = utf8_constants(&files["com/example/app/Main.class"]).unwrap();
    assert!(constants.contains(&"bundled/lib/Widget".to_string()));
    assert!(constants.contains(&"Lbundled/lib/Widget;".to_string()));
    assert!(!constants.contains(&"com/example/lib/Widget".to_string()));
    assert!(constants.contains(&"com.example.lib.Widget".to_string()));

    // The service descriptor is renamed and its content rewritten
    assert!(!files.contains_key("META-INF/services/com.example.lib.Widget"));
    assert_eq!(
        files["META-INF/services/bundled.lib.Widget"],
        b"# widgets\nbundled.lib.WidgetImpl\n"
    );

    // Signature files never reach the output
    assert!(!files.contains_key("META-INF/LIB.SF"));
}

#[test]
fn test_relocating_relocated_output_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path());

    let mut config = config_with(vec![
        module("com.example:app:1.0", app),
        module("com.example:lib:2.0", lib),
    ]);
    config.relocations.push(widget_rule());
    let first = dir.path().join("first.jar");
    Assembler::new(config).assemble(&first).unwrap();

    let mut again = config_with(vec![module("com.example:app:1.0", first.clone())]);
    again.relocations.push(widget_rule());
    let second = dir.path().join("second.jar");
    Assembler::new(again).assemble(&second).unwrap();

    let (first_files, _) = read_jar(&first);
    let (second_files, _) = read_jar(&second);
    assert_eq!(first_files, second_files);
}

#[test]
fn test_two_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path());
    let extra = write_jar(
        &dir.path().join("extra.jar"),
        &[
            ("META-INF/services/com.example.lib.Widget", b"org.extra.Widget\n"),
            ("org/extra/Widget.class", &ClassFile::new("org/extra/Widget").build()),
        ],
    );

    let build = |dest: &std::path::Path| {
        let mut config = config_with(vec![
            module("com.example:app:1.0", app.clone()),
            module("com.example:lib:2.0", lib.clone()),
            module("org.extra:extra:1.0", extra.clone()),
        ]);
        config.relocations.push(widget_rule());
        config.manifest.version = Some("1.2.3".to_string());
        Assembler::new(config).assemble(dest).unwrap()
    };

    let one = build(&dir.path().join("one.jar"));
    let two = build(&dir.path().join("two.jar"));

    assert_eq!(one.sha256, two.sha256);
    assert_eq!(
        std::fs::read(dir.path().join("one.jar")).unwrap(),
        std::fs::read(dir.path().join("two.jar")).unwrap()
    );

    // Service records follow module order
    let (files, _) = read_jar(&dir.path().join("one.jar"));
    assert_eq!(
        files["META-INF/services/bundled.lib.Widget"],
        b"# widgets\nbundled.lib.WidgetImpl\norg.extra.Widget\n"
    );
}

#[test]
fn test_every_input_entry_is_accounted_for() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path());
    let dup = write_jar(
        &dir.path().join("dup.jar"),
        &[(
            "com/example/lib/Widget.class",
            &ClassFile::new("com/example/lib/Widget").reference("java/lang/String").build(),
        )],
    );

    let mut config = config_with(vec![
        module("com.example:app:1.0", app),
        module("com.example:lib:2.0", lib),
        module("com.example:dup:1.0", dup),
    ]);
    config.relocations.push(widget_rule());

    let dest = dir.path().join("out.jar");
    let report = Assembler::new(config).assemble(&dest).unwrap();
    let (files, _) = read_jar(&dest);

    // 2 app files + 4 lib files + 1 dup file
    assert_eq!(report.entries.len(), 7);
    assert_eq!(report.modules.iter().map(|m| m.entries).sum::<usize>(), 7);

    for record in &report.entries {
        match &record.fate {
            EntryFate::Written | EntryFate::Merged { .. } => {
                assert!(files.contains_key(&record.final_path), "missing {}", record.final_path)
            }
            EntryFate::Dropped { kept_from } | EntryFate::Collapsed { kept_from } => {
                assert!(files.contains_key(&record.final_path));
                assert_ne!(kept_from, &record.module);
            }
            EntryFate::Excluded { rule } => assert!(!rule.is_empty()),
        }
    }

    let dropped: Vec<_> = report
        .entries
        .iter()
        .filter(|r| matches!(r.fate, EntryFate::Dropped { .. }))
        .collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].module, "com.example:dup:1.0");
    assert_eq!(dropped[0].final_path, "bundled/lib/Widget.class");
}

#[test]
fn test_unbound_duplicate_fails_naming_both_modules() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_jar(&dir.path().join("a.jar"), &[("META-INF/foo.txt", b"from a")]);
    let b = write_jar(&dir.path().join("b.jar"), &[("META-INF/foo.txt", b"from b")]);

    let config = config_with(vec![
        module("com.example:a:1.0", a),
        module("com.example:b:1.0", b),
    ]);
    let dest = dir.path().join("out.jar");
    let err = Assembler::new(config).assemble(&dest).unwrap_err();

    assert_eq!(err.exit_code(), 2);
    match err {
        Error::UnresolvedMergeConflict { path, first, second } => {
            assert_eq!(path, "META-INF/foo.txt");
            assert_eq!(first, "com.example:a:1.0");
            assert_eq!(second, "com.example:b:1.0");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_embedded_module_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app_and_lib(dir.path());
    let api = write_jar(
        &dir.path().join("api.jar"),
        &[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n\r\n"),
            ("com/example/lib/Api.class", &ClassFile::new("com/example/lib/Api").build()),
        ],
    );

    let mut config = config_with(vec![
        module("com.example:app:1.0", app),
        module("com.example:api:1.0", api.clone()),
    ]);
    config.dispositions.embed = vec!["com.example:api".to_string()];
    config.relocations.push(widget_rule());

    let dest = dir.path().join("out.jar");
    let report = Assembler::new(config).assemble(&dest).unwrap();
    let (files, order) = read_jar(&dest);

    let embed_path = "META-INF/libraries/com/example/api/1.0/api-1.0.jar";
    assert_eq!(files[embed_path], std::fs::read(&api).unwrap());
    assert_eq!(order.last().map(String::as_str), Some(embed_path));
    assert_eq!(order[1], MANIFEST_PATH);

    // Nothing from the embedded module is flattened or relocated
    assert!(!files.contains_key("bundled/lib/Api.class"));
    assert!(!files.contains_key("com/example/lib/Api.class"));
    assert_eq!(report.modules[1].embed_path.as_deref(), Some(embed_path));
    assert!(report.entries_for("com.example:api:1.0").next().is_none());
}

#[test]
fn test_excluded_module_contributes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path());

    let mut config = config_with(vec![
        module("com.example:app:1.0", app),
        module("com.example:lib:2.0", lib),
        module("org.codehaus.mojo:animal-sniffer-annotations:1.18", dir.path().join("absent.jar")),
    ]);
    config.dispositions.exclude = vec!["com.example:lib".to_string(), "org.codehaus.mojo:*".to_string()];

    let dest = dir.path().join("out.jar");
    Assembler::new(config).assemble(&dest).unwrap();
    let (files, _) = read_jar(&dest);

    let paths: BTreeSet<_> = files.keys().map(String::as_str).collect();
    assert_eq!(paths, BTreeSet::from([MANIFEST_PATH, "com/example/app/Main.class"]));
}

#[test]
fn test_missing_module_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(vec![module("com.example:gone:1.0", dir.path().join("gone.jar"))]);

    let err = Assembler::new(config).assemble(&dir.path().join("out.jar")).unwrap_err();
    assert_eq!(err.exit_code(), 5);
    assert!(matches!(err, Error::MissingModuleArtifact { ref coordinate, .. } if coordinate == "com.example:gone:1.0"));
}

#[test]
fn test_corrupt_module_archive() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.jar");
    std::fs::write(&bad, b"PK\x03\x04 truncated").unwrap();

    let config = config_with(vec![module("com.example:bad:1.0", bad)]);
    let err = Assembler::new(config).assemble(&dir.path().join("out.jar")).unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(matches!(err, Error::CorruptArchive { .. }));
}

#[test]
fn test_newer_release_classes_are_tiered_with_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_jar(
        &dir.path().join("base.jar"),
        &[("com/example/Jvm.class", &ClassFile::new("com/example/Jvm").build())],
    );
    let java9 = write_jar(
        &dir.path().join("java9.jar"),
        &[("com/example/Jvm.class", &ClassFile::new("com/example/Jvm").release(9).build())],
    );

    let mut java9_module = module("com.example:launcher-java9:1.0", java9);
    java9_module.release = Some(9);
    let mut config = config_with(vec![module("com.example:launcher:1.0", base), java9_module]);
    config.multi_release.base_release = Some(8);

    let dest = dir.path().join("out.jar");
    let report = Assembler::new(config).assemble(&dest).unwrap();
    let (files, _) = read_jar(&dest);

    assert!(report.multi_release);
    assert_eq!(files["com/example/Jvm.class"][7], 52);
    assert_eq!(files["META-INF/versions/9/com/example/Jvm.class"][7], 53);

    let manifest = Manifest::parse(&files[MANIFEST_PATH]).unwrap();
    assert_eq!(manifest.main.get("Multi-Release"), Some("true"));
}

#[test]
fn test_tiered_class_without_fallback_fails() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        &dir.path().join("modern.jar"),
        &[("com/example/Modern.class", &ClassFile::new("com/example/Modern").release(11).build())],
    );

    let mut config = config_with(vec![module("com.example:modern:1.0", jar)]);
    config.multi_release.base_release = Some(8);

    let err = Assembler::new(config).assemble(&dir.path().join("out.jar")).unwrap_err();
    assert_eq!(err.exit_code(), 7);
    assert!(matches!(
        err,
        Error::MissingReleaseFallback { ref path, release: 11 } if path == "com/example/Modern.class"
    ));
}

#[test]
fn test_assembly_from_configuration_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("libs")).unwrap();
    write_jar(
        &dir.path().join("libs/launcher.jar"),
        &[("space/vectrix/ignite/Bootstrap.class", &ClassFile::new("space/vectrix/ignite/Bootstrap").build())],
    );
    write_jar(
        &dir.path().join("libs/modlauncher.jar"),
        &[
            (
                "META-INF/MANIFEST.MF",
                b"Manifest-Version: 1.0\r\nBuilt-By: upstream\r\nMain-Class: cpw.mods.Launcher\r\n\r\nName: org/objectweb/asm/\r\nImplementation-Version: 9.1\r\n\r\n",
            ),
            ("cpw/mods/Launcher.class", &ClassFile::new("cpw/mods/Launcher").build()),
        ],
    );

    let toml = r#"
[artifact]
name = "ignite"
output = "build/ignite.jar"

[[module]]
coordinate = "space.vectrix.ignite:ignite-launcher:0.3.0"
origin = "libs/launcher.jar"

[[module]]
coordinate = "cpw.mods:modlauncher:8.0.9"
origin = "libs/modlauncher.jar"

[dispositions]
embed = ["cpw.mods:modlauncher"]

[[relocation]]
from = "org.objectweb.asm"
to = "space.vectrix.ignite.libs.asm"

[manifest]
version = "0.3.0-SNAPSHOT"
title = "ignite"
vendor = "vectrix.space"
main_class = "space.vectrix.ignite.Bootstrap"
harvest_from = "cpw.mods:modlauncher"
"#;
    let config_path = dir.path().join("jarforge.toml");
    std::fs::write(&config_path, toml).unwrap();

    let config = AssemblyConfig::from_file(&config_path).unwrap();
    let dest = config.output_path(None).unwrap();
    assert_eq!(dest, dir.path().join("build/ignite.jar"));
    Assembler::new(config).assemble(&dest).unwrap();

    let (files, _) = read_jar(&dest);
    let manifest = Manifest::parse(&files[MANIFEST_PATH]).unwrap();
    assert_eq!(manifest.main.get("Main-Class"), Some("space.vectrix.ignite.Bootstrap"));
    assert_eq!(manifest.main.get("Specification-Version"), Some("0.3"));
    assert_eq!(manifest.main.get("Implementation-Version"), Some("0.3.0-SNAPSHOT"));
    assert_eq!(manifest.main.get("Built-By"), Some("upstream"));
    assert!(manifest.main.get("Multi-Release").is_none());
    assert_eq!(
        manifest
            .section("space/vectrix/ignite/libs/asm/")
            .and_then(|s| s.get("Implementation-Version")),
        Some("9.1")
    );
    assert!(files.contains_key("META-INF/libraries/cpw/mods/modlauncher/8.0.9/modlauncher-8.0.9.jar"));
}

#[test]
fn test_ambiguous_relocation_rules_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app_and_lib(dir.path());

    let mut config = config_with(vec![module("com.example:app:1.0", app)]);
    config.relocations.push(RelocationRule::new("com.example.lib", "a.lib"));
    config.relocations.push(RelocationRule::new("com/example/lib", "b.lib"));

    let err = Assembler::new(config).assemble(&dir.path().join("out.jar")).unwrap_err();
    assert_eq!(err.exit_code(), 4);
    assert!(matches!(err, Error::RelocationAmbiguity { .. }));
}
