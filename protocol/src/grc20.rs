//! GRC-20 content messages, as published to IPFS.
//!
//! Enumerations are kept as raw `i32` on the messages so that the decoder can tell unknown
//! codes apart from known ones.

/// Leading fields shared by every IPFS payload. Used to dispatch on the action type.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpfsMetadata {
    #[prost(enumeration = "ActionType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub version: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Edit {
    #[prost(enumeration = "ActionType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub version: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "5")]
    pub ops: ::prost::alloc::vec::Vec<Op>,
    #[prost(string, repeated, tag = "6")]
    pub authors: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

/// An edit that is part of a space import. Carries the provenance of the original edit.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImportEdit {
    #[prost(enumeration = "ActionType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub version: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "5")]
    pub ops: ::prost::alloc::vec::Vec<Op>,
    #[prost(string, repeated, tag = "6")]
    pub authors: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "7")]
    pub created_by: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub created_at: ::prost::alloc::string::String,
    #[prost(string, tag = "9")]
    pub block_hash: ::prost::alloc::string::String,
    #[prost(string, tag = "10")]
    pub block_number: ::prost::alloc::string::String,
    #[prost(string, tag = "11")]
    pub transaction_hash: ::prost::alloc::string::String,
}

/// A space import: a list of IPFS uris, each pointing to an [ImportEdit].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Import {
    #[prost(enumeration = "ActionType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub version: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub previous_network: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub previous_contract_address: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "5")]
    pub edits: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Op {
    #[prost(enumeration = "OpType", tag = "1")]
    pub r#type: i32,
    #[prost(message, optional, tag = "2")]
    pub triple: ::core::option::Option<Triple>,
    #[prost(message, optional, tag = "3")]
    pub entity: ::core::option::Option<Entity>,
    #[prost(message, optional, tag = "4")]
    pub relation: ::core::option::Option<Relation>,
    #[prost(message, repeated, tag = "5")]
    pub triples: ::prost::alloc::vec::Vec<Triple>,
    #[prost(string, tag = "6")]
    pub url: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Triple {
    #[prost(string, tag = "1")]
    pub entity: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub attribute: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub value: ::core::option::Option<Value>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Value {
    #[prost(enumeration = "ValueType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Entity {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub types: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Relation {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub from_entity: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub to_entity: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub entity: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub index: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ActionType {
    Default = 0,
    AddEdit = 1,
    AddSubspace = 2,
    RemoveSubspace = 3,
    ImportSpace = 4,
    ArchiveSpace = 5,
    AddEditor = 6,
    RemoveEditor = 7,
    AddMember = 8,
    RemoveMember = 9,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum OpType {
    None = 0,
    SetTriple = 1,
    DeleteTriple = 2,
    SetTripleBatch = 3,
    DeleteEntity = 4,
    CreateRelation = 5,
    DeleteRelation = 6,
    ImportFile = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ValueType {
    Unknown = 0,
    Text = 1,
    Number = 2,
    Checkbox = 3,
    Url = 4,
    Time = 5,
    Point = 6,
}
