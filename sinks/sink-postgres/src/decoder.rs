//! Decode GRC-20 payloads into validated edits.
use std::fmt;

use error_stack::{Result, ResultExt};
use geo_protocol::grc20;
use prost::Message;

/// The only content version accepted.
pub const SUPPORTED_VERSION: &str = "1.0.0";

#[derive(Debug)]
pub struct DecodeError;
impl error_stack::Context for DecodeError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode content")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    AddEdit,
    ImportSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Number,
    Checkbox,
    Url,
    Time,
    Point,
    Relation,
}

impl ValueType {
    /// Value type of a triple or column. Unknown codes are read as text.
    pub fn from_code(code: i32) -> ValueType {
        match code {
            2 => ValueType::Number,
            3 => ValueType::Checkbox,
            4 => ValueType::Url,
            5 => ValueType::Time,
            6 => ValueType::Point,
            7 => ValueType::Relation,
            _ => ValueType::Text,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ValueType::Text => 1,
            ValueType::Number => 2,
            ValueType::Checkbox => 3,
            ValueType::Url => 4,
            ValueType::Time => 5,
            ValueType::Point => 6,
            ValueType::Relation => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "TEXT",
            ValueType::Number => "NUMBER",
            ValueType::Checkbox => "CHECKBOX",
            ValueType::Url => "URL",
            ValueType::Time => "TIME",
            ValueType::Point => "POINT",
            ValueType::Relation => "RELATION",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub value_type: ValueType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Triple {
    pub entity: String,
    pub attribute: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: String,
    pub type_id: String,
    pub from_entity: String,
    pub to_entity: String,
    /// Entity holding the relation's own triples.
    pub entity: String,
    pub index: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    SetTriple(Triple),
    DeleteTriple { entity: String, attribute: String },
    SetTripleBatch(Vec<Triple>),
    DeleteEntity { id: String },
    CreateRelation(Relation),
    DeleteRelation { id: String },
    ImportFile { url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub id: String,
    pub name: String,
    pub version: String,
    pub action: ActionType,
    pub ops: Vec<Op>,
    pub authors: Vec<String>,
}

/// An edit replayed from another network as part of a space import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportEdit {
    pub edit: Edit,
    pub created_by: String,
    pub created_at: String,
    pub block_hash: String,
    pub block_number: String,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub version: String,
    pub previous_network: String,
    pub previous_contract_address: String,
    /// IPFS uris of the imported edits.
    pub edits: Vec<String>,
}

/// Read the action type of any payload, without validating the rest of it.
pub fn decode_action_type(bytes: &[u8]) -> Result<ActionType, DecodeError> {
    let metadata = grc20::IpfsMetadata::decode(bytes)
        .change_context(DecodeError)
        .attach_printable("malformed metadata")?;
    check_version(&metadata.version)?;
    action_type(metadata.r#type)
}

pub fn decode_edit(bytes: &[u8]) -> Result<Edit, DecodeError> {
    let edit = grc20::Edit::decode(bytes)
        .change_context(DecodeError)
        .attach_printable("malformed edit")?;

    check_version(&edit.version)?;

    Ok(Edit {
        action: action_type(edit.r#type)?,
        ops: decode_ops(edit.ops)?,
        id: edit.id,
        name: edit.name,
        version: edit.version,
        authors: edit.authors,
    })
}

pub fn decode_import(bytes: &[u8]) -> Result<Import, DecodeError> {
    let import = grc20::Import::decode(bytes)
        .change_context(DecodeError)
        .attach_printable("malformed import")?;

    check_version(&import.version)?;
    if action_type(import.r#type)? != ActionType::ImportSpace {
        return Err(DecodeError).attach_printable("import must have type IMPORT_SPACE");
    }

    Ok(Import {
        version: import.version,
        previous_network: import.previous_network,
        previous_contract_address: import.previous_contract_address,
        edits: import.edits,
    })
}

pub fn decode_import_edit(bytes: &[u8]) -> Result<ImportEdit, DecodeError> {
    let edit = grc20::ImportEdit::decode(bytes)
        .change_context(DecodeError)
        .attach_printable("malformed import edit")?;

    check_version(&edit.version)?;

    Ok(ImportEdit {
        edit: Edit {
            action: action_type(edit.r#type)?,
            ops: decode_ops(edit.ops)?,
            id: edit.id,
            name: edit.name,
            version: edit.version,
            authors: edit.authors,
        },
        created_by: edit.created_by,
        created_at: edit.created_at,
        block_hash: edit.block_hash,
        block_number: edit.block_number,
        transaction_hash: edit.transaction_hash,
    })
}

pub fn encode_edit(edit: &Edit) -> Vec<u8> {
    let action = match edit.action {
        ActionType::AddEdit => grc20::ActionType::AddEdit,
        ActionType::ImportSpace => grc20::ActionType::ImportSpace,
    };

    grc20::Edit {
        r#type: action as i32,
        version: edit.version.clone(),
        id: edit.id.clone(),
        name: edit.name.clone(),
        ops: edit.ops.iter().map(encode_op).collect(),
        authors: edit.authors.clone(),
    }
    .encode_to_vec()
}

fn check_version(version: &str) -> Result<(), DecodeError> {
    if version != SUPPORTED_VERSION {
        return Err(DecodeError)
            .attach_printable("unsupported version")
            .attach_printable_lazy(|| format!("version: {version:?}"));
    }
    Ok(())
}

fn action_type(code: i32) -> Result<ActionType, DecodeError> {
    match grc20::ActionType::try_from(code) {
        Ok(grc20::ActionType::AddEdit) => Ok(ActionType::AddEdit),
        Ok(grc20::ActionType::ImportSpace) => Ok(ActionType::ImportSpace),
        _ => Err(DecodeError)
            .attach_printable("unsupported action type")
            .attach_printable_lazy(|| format!("type: {code}")),
    }
}

fn decode_ops(ops: Vec<grc20::Op>) -> Result<Vec<Op>, DecodeError> {
    ops.into_iter()
        .enumerate()
        .map(|(index, op)| decode_op(op).attach_printable_lazy(|| format!("op index: {index}")))
        .collect()
}

fn decode_op(op: grc20::Op) -> Result<Op, DecodeError> {
    let op_type = grc20::OpType::try_from(op.r#type)
        .change_context(DecodeError)
        .attach_printable_lazy(|| format!("unknown op type: {}", op.r#type))?;

    match op_type {
        grc20::OpType::None => Err(DecodeError).attach_printable("op type is not set"),
        grc20::OpType::SetTriple => {
            let triple = op
                .triple
                .ok_or(DecodeError)
                .attach_printable("SET_TRIPLE without triple")?;
            Ok(Op::SetTriple(decode_triple(triple)?))
        }
        grc20::OpType::DeleteTriple => {
            let triple = op
                .triple
                .ok_or(DecodeError)
                .attach_printable("DELETE_TRIPLE without triple")?;
            let (entity, attribute) = triple_key(&triple)?;
            Ok(Op::DeleteTriple { entity, attribute })
        }
        grc20::OpType::SetTripleBatch => {
            let triples = op
                .triples
                .into_iter()
                .map(decode_triple)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Op::SetTripleBatch(triples))
        }
        grc20::OpType::DeleteEntity => {
            let entity = op
                .entity
                .ok_or(DecodeError)
                .attach_printable("DELETE_ENTITY without entity")?;
            Ok(Op::DeleteEntity {
                id: non_empty(entity.id, "entity id")?,
            })
        }
        grc20::OpType::CreateRelation => {
            let relation = op
                .relation
                .ok_or(DecodeError)
                .attach_printable("CREATE_RELATION without relation")?;
            Ok(Op::CreateRelation(Relation {
                id: non_empty(relation.id, "relation id")?,
                type_id: non_empty(relation.r#type, "relation type")?,
                from_entity: non_empty(relation.from_entity, "relation from entity")?,
                to_entity: non_empty(relation.to_entity, "relation to entity")?,
                entity: relation.entity,
                index: relation.index,
            }))
        }
        grc20::OpType::DeleteRelation => {
            let relation = op
                .relation
                .ok_or(DecodeError)
                .attach_printable("DELETE_RELATION without relation")?;
            Ok(Op::DeleteRelation {
                id: non_empty(relation.id, "relation id")?,
            })
        }
        grc20::OpType::ImportFile => Ok(Op::ImportFile {
            url: non_empty(op.url, "file url")?,
        }),
    }
}

fn decode_triple(triple: grc20::Triple) -> Result<Triple, DecodeError> {
    let (entity, attribute) = triple_key(&triple)?;
    let value = triple
        .value
        .ok_or(DecodeError)
        .attach_printable("triple without value")
        .attach_printable_lazy(|| format!("entity: {entity}, attribute: {attribute}"))?;

    Ok(Triple {
        entity,
        attribute,
        value: Value {
            value_type: ValueType::from_code(value.r#type),
            value: value.value,
        },
    })
}

fn triple_key(triple: &grc20::Triple) -> Result<(String, String), DecodeError> {
    Ok((
        non_empty(triple.entity.clone(), "triple entity")?,
        non_empty(triple.attribute.clone(), "triple attribute")?,
    ))
}

fn non_empty(value: String, field: &'static str) -> Result<String, DecodeError> {
    if value.is_empty() {
        return Err(DecodeError).attach_printable(format!("missing {field}"));
    }
    Ok(value)
}

fn encode_op(op: &Op) -> grc20::Op {
    let mut encoded = grc20::Op::default();
    match op {
        Op::SetTriple(triple) => {
            encoded.r#type = grc20::OpType::SetTriple as i32;
            encoded.triple = Some(encode_triple(triple));
        }
        Op::DeleteTriple { entity, attribute } => {
            encoded.r#type = grc20::OpType::DeleteTriple as i32;
            encoded.triple = Some(grc20::Triple {
                entity: entity.clone(),
                attribute: attribute.clone(),
                value: None,
            });
        }
        Op::SetTripleBatch(triples) => {
            encoded.r#type = grc20::OpType::SetTripleBatch as i32;
            encoded.triples = triples.iter().map(encode_triple).collect();
        }
        Op::DeleteEntity { id } => {
            encoded.r#type = grc20::OpType::DeleteEntity as i32;
            encoded.entity = Some(grc20::Entity {
                id: id.clone(),
                types: Vec::new(),
            });
        }
        Op::CreateRelation(relation) => {
            encoded.r#type = grc20::OpType::CreateRelation as i32;
            encoded.relation = Some(grc20::Relation {
                id: relation.id.clone(),
                r#type: relation.type_id.clone(),
                from_entity: relation.from_entity.clone(),
                to_entity: relation.to_entity.clone(),
                entity: relation.entity.clone(),
                index: relation.index.clone(),
            });
        }
        Op::DeleteRelation { id } => {
            encoded.r#type = grc20::OpType::DeleteRelation as i32;
            encoded.relation = Some(grc20::Relation {
                id: id.clone(),
                ..Default::default()
            });
        }
        Op::ImportFile { url } => {
            encoded.r#type = grc20::OpType::ImportFile as i32;
            encoded.url = url.clone();
        }
    }
    encoded
}

fn encode_triple(triple: &Triple) -> grc20::Triple {
    grc20::Triple {
        entity: triple.entity.clone(),
        attribute: triple.attribute.clone(),
        value: Some(grc20::Value {
            r#type: triple.value.value_type.code(),
            value: triple.value.value.clone(),
        }),
    }
}
