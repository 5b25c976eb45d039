/*!
 * Tests for language utility functions
 */

use sitelingo::language_utils::{get_language_name, normalize_locale, split_locale, validate_language_code};

#[test]
fn test_splitLocale_shouldSeparateRegion() {
    assert_eq!(split_locale("pt-BR"), ("pt".to_string(), Some("BR".to_string())));
    assert_eq!(split_locale("ES"), ("es".to_string(), None));
    assert_eq!(split_locale("zh_Hant"), ("zh".to_string(), Some("Hant".to_string())));
}

#[test]
fn test_validateLanguageCode_shouldAcceptIsoCodes() {
    for code in ["en", "de", "ja", "pt-BR", "zh-Hant", "deu"] {
        assert!(validate_language_code(code).is_ok(), "{} should be valid", code);
    }
}

#[test]
fn test_validateLanguageCode_shouldRejectUnknownCodes() {
    for code in ["", "x", "qq", "english"] {
        assert!(validate_language_code(code).is_err(), "{} should be invalid", code);
    }
}

#[test]
fn test_normalizeLocale_shouldProduceUrlSafeCodes() {
    assert_eq!(normalize_locale("pt_BR"), "pt-br");
    assert_eq!(normalize_locale("DE"), "de");
}

#[test]
fn test_getLanguageName_shouldReturnEnglishName() {
    assert_eq!(get_language_name("es").unwrap(), "Spanish");
    assert_eq!(get_language_name("pt-br").unwrap(), "Portuguese (BR)");
    assert!(get_language_name("zz").is_err());
}
