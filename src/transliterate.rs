//! Serbian Cyrillic to Latin transliteration.
//!
//! Every text field of the corpus is stored twice: as scraped, and
//! transliterated into Latin script so Serbian (mixed-script) and Slovene
//! (Latin-only) sources can be searched the same way.

/// Transliterate Serbian Cyrillic characters to their Latin (Gaj) equivalents.
///
/// Characters outside the Serbian Cyrillic alphabet are passed through
/// unchanged, so Latin text is returned as-is.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(transliterate("Љубав и језик"), "Ljubav i jezik");
/// assert_eq!(transliterate("jezik"), "jezik");
/// ```
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match latin(c) {
            Some(l) => out.push_str(l),
            None => out.push(c),
        }
    }
    out
}

fn latin(c: char) -> Option<&'static str> {
    let l = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'ђ' => "đ",
        'е' => "e",
        'ж' => "ž",
        'з' => "z",
        'и' => "i",
        'ј' => "j",
        'к' => "k",
        'л' => "l",
        'љ' => "lj",
        'м' => "m",
        'н' => "n",
        'њ' => "nj",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'ћ' => "ć",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "c",
        'ч' => "č",
        'џ' => "dž",
        'ш' => "š",
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Ђ' => "Đ",
        'Е' => "E",
        'Ж' => "Ž",
        'З' => "Z",
        'И' => "I",
        'Ј' => "J",
        'К' => "K",
        'Л' => "L",
        'Љ' => "Lj",
        'М' => "M",
        'Н' => "N",
        'Њ' => "Nj",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'Ћ' => "Ć",
        'У' => "U",
        'Ф' => "F",
        'Х' => "H",
        'Ц' => "C",
        'Ч' => "Č",
        'Џ' => "Dž",
        'Ш' => "Š",
        _ => return None,
    };
    Some(l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyrillic_to_latin() {
        assert_eq!(transliterate("Српски језик"), "Srpski jezik");
        assert_eq!(transliterate("Љубав, њива, џеп"), "Ljubav, njiva, džep");
        assert_eq!(transliterate("Ђорђе Ћосић"), "Đorđe Ćosić");
    }

    #[test]
    fn test_latin_passes_through() {
        assert_eq!(transliterate("slovenščina 2019!"), "slovenščina 2019!");
        assert_eq!(transliterate(""), "");
    }

    #[test]
    fn test_mixed_script() {
        assert_eq!(transliterate("Politika: Језик и pravopis"), "Politika: Jezik i pravopis");
    }
}
