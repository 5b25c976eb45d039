/*!
 * Tests for file utility functions
 */

use std::path::PathBuf;

use sitelingo::file_utils::FileManager;

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_discoverDocuments_shouldFindNestedHtmlSorted() {
    let dir = create_temp_dir().unwrap();
    create_test_file(dir.path(), "index.html", "<p>home</p>").unwrap();
    create_test_file(dir.path(), "docs/setup.htm", "<p>setup</p>").unwrap();
    create_test_file(dir.path(), "docs/img/logo.svg", "<svg/>").unwrap();

    let documents = FileManager::discover_documents(dir.path(), &[]).unwrap();
    let paths: Vec<&str> = documents.iter().map(|d| d.relative_path.as_str()).collect();

    assert_eq!(paths, vec!["docs/setup.htm", "index.html"]);
    assert_eq!(documents[1].source, "<p>home</p>");
}

#[test]
fn test_discoverDocuments_shouldSkipLocaleOutputOnlyAtRoot() {
    let dir = create_temp_dir().unwrap();
    create_test_file(dir.path(), "index.html", "<p>home</p>").unwrap();
    create_test_file(dir.path(), "fr/index.html", "<p>accueil</p>").unwrap();
    create_test_file(dir.path(), "guides/fr/index.html", "<p>guide</p>").unwrap();

    let documents = FileManager::discover_documents(dir.path(), &["fr".to_string()]).unwrap();
    let paths: Vec<&str> = documents.iter().map(|d| d.relative_path.as_str()).collect();

    assert_eq!(paths, vec!["guides/fr/index.html", "index.html"]);
}

#[test]
fn test_discoverDocuments_withMissingDirectory_shouldFail() {
    let dir = create_temp_dir().unwrap();
    assert!(FileManager::discover_documents(dir.path().join("missing"), &[]).is_err());
}

#[test]
fn test_writeToFile_shouldCreateParentDirectories() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("a/b/c.html");

    FileManager::write_to_file(&path, "<p>x</p>").unwrap();

    assert!(FileManager::file_exists(&path));
    assert_eq!(FileManager::read_optional(&path).unwrap().as_deref(), Some("<p>x</p>"));
    assert_eq!(FileManager::read_optional(dir.path().join("nope.html")).unwrap(), None);
}

#[test]
fn test_localizedPath_shouldNestUnderLanguage() {
    assert_eq!(
        FileManager::localized_path("/site", "pt-br", "docs/index.html"),
        PathBuf::from("/site/pt-br/docs/index.html")
    );
}
