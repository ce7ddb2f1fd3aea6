/// Decodes the common named entities and numeric character references.
/// Anything unrecognised is left as written.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find('&') {
        let amp = cursor + offset;
        out.push_str(&input[cursor..amp]);

        let rest = &input[amp + 1..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 32)
            .and_then(|semi| decode_entity(&rest[..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                cursor = amp + semi + 2;
            }
            None => {
                out.push('&');
                cursor = amp + 1;
            }
        }
    }

    out.push_str(&input[cursor..]);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    let named = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "laquo" => '\u{ab}',
        "raquo" => '\u{bb}',
        "middot" => '\u{b7}',
        "bull" => '\u{2022}',
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let value = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            return char::from_u32(value).filter(|ch| *ch != '\0');
        }
    };
    Some(named)
}
