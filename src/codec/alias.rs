use super::patterns::ALIAS_RE;
use super::scan::{parse_word, single_quote};
use super::{strip_eol, Codec, Decoded};
use crate::error::{Error, Result};
use crate::model::{validate_name, Alias, EntityKind};

/// `alias name='command'`, one statement per line.
pub struct AliasCodec;

impl Codec for AliasCodec {
    type Entity = Alias;

    const KIND: EntityKind = EntityKind::Alias;

    fn name(entity: &Alias) -> &str {
        &entity.name
    }

    fn validate(entity: &Alias) -> Result<()> {
        validate_name(&entity.name)?;
        if entity.command.contains(['\n', '\r']) {
            return Err(Error::InvalidBody {
                name: entity.name.clone(),
                reason: "alias command must be a single line".into(),
            });
        }
        Ok(())
    }

    fn encode(entity: &Alias) -> String {
        format!("alias {}={}\n", entity.name, single_quote(&entity.command))
    }

    fn decode_all(lines: &[&str]) -> Vec<Decoded<Alias>> {
        lines
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| {
                let caps = ALIAS_RE.captures(strip_eol(line))?;
                let command = parse_word(caps[2].trim_end())?;
                Some(Decoded {
                    entity: Alias::new(&caps[1], command),
                    span: idx..idx + 1,
                })
            })
            .collect()
    }
}
