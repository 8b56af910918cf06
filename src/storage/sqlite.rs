//! SQLite document store implementing the metadata collection contract

use super::document::{
    entity_from_document, entity_key, entity_to_document, relationship_from_document,
    relationship_key, relationship_to_document, Document, InstanceKind,
};
use super::traits::{
    Capability, MetadataCollection, OpenRepository, RepositoryError, RepositoryResult,
};
use super::value::stored_properties;
use crate::model::{
    AttributeTypeDef, Classification, EntityDetail, EntitySummary, InstanceHeader,
    InstanceProperties, InstanceStatus, Relationship, TypeDef, TypeDefCategory, TypeDefGallery,
    TypeDefKind, TypeDefPatch,
};
use crate::types::TypeRegistry;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Behaviour switches for a [`SqliteRepository`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryOptions {
    /// Collection id for a new database; an existing database keeps its own
    pub metadata_collection_id: Option<String>,
    /// Offer soft delete and restore
    pub soft_delete: bool,
    /// Offer undo of the last entity update
    pub undo: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            metadata_collection_id: None,
            soft_delete: true,
            undo: true,
        }
    }
}

/// SQLite-backed metadata collection
///
/// Instances are stored as flat JSON documents (see `storage::document`)
/// in a `documents` table, with every version kept in `document_history`.
/// Type definitions are persisted in their own tables and indexed in memory
/// by a [`TypeRegistry`]. Thread-safe via internal mutex on the connection.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
    types: TypeRegistry,
    metadata_collection_id: String,
    options: RepositoryOptions,
}

impl SqliteRepository {
    fn init_schema(conn: &Connection) -> RepositoryResult<()> {
        conn.execute_batch(
            r#"
            -- Repository identity
            CREATE TABLE IF NOT EXISTS collection (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS attribute_typedefs (
                guid TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                definition_json TEXT NOT NULL
            );

            -- rowid order is registration order, so references load first
            CREATE TABLE IF NOT EXISTS typedefs (
                guid TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL,
                version INTEGER NOT NULL,
                definition_json TEXT NOT NULL
            );

            -- Current version of each instance document
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                type_name TEXT NOT NULL,
                status TEXT NOT NULL,
                version INTEGER NOT NULL,
                end1_guid TEXT,
                end2_guid TEXT,
                document_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_type
                ON documents(kind, type_name);
            CREATE INDEX IF NOT EXISTS idx_documents_end1
                ON documents(end1_guid);
            CREATE INDEX IF NOT EXISTS idx_documents_end2
                ON documents(end2_guid);

            -- Every version ever written, for undo
            CREATE TABLE IF NOT EXISTS document_history (
                key TEXT NOT NULL,
                version INTEGER NOT NULL,
                document_json TEXT NOT NULL,
                PRIMARY KEY (key, version)
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    /// Read the stored collection id, or record the configured/new one
    fn init_collection_id(
        conn: &Connection,
        options: &RepositoryOptions,
    ) -> RepositoryResult<String> {
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM collection WHERE key = 'metadata_collection_id'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match (stored, &options.metadata_collection_id) {
            (Some(stored), Some(wanted)) if &stored != wanted => {
                Err(RepositoryError::InvalidParameter(format!(
                    "database belongs to metadata collection {}, not {}",
                    stored, wanted
                )))
            }
            (Some(stored), _) => Ok(stored),
            (None, wanted) => {
                let id = wanted
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                conn.execute(
                    "INSERT INTO collection (key, value) VALUES ('metadata_collection_id', ?1)",
                    params![id],
                )?;
                Ok(id)
            }
        }
    }

    /// Rebuild the in-memory type registry from the type tables
    fn load_types(conn: &Connection, registry: &TypeRegistry) -> RepositoryResult<()> {
        let mut stmt =
            conn.prepare("SELECT definition_json FROM attribute_typedefs ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            let def: AttributeTypeDef = serde_json::from_str(&row?)?;
            registry.register_attribute_type(def)?;
        }

        let mut stmt = conn.prepare("SELECT definition_json FROM typedefs ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            let def: TypeDef = serde_json::from_str(&row?)?;
            registry.register_type(def)?;
        }
        Ok(())
    }

    fn from_connection(conn: Connection, options: RepositoryOptions) -> RepositoryResult<Self> {
        Self::init_schema(&conn)?;
        let metadata_collection_id = Self::init_collection_id(&conn, &options)?;
        let types = TypeRegistry::new();
        Self::load_types(&conn, &types)?;

        info!(
            metadata_collection_id = %metadata_collection_id,
            soft_delete = options.soft_delete,
            undo = options.undo,
            "opened sqlite metadata collection"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            types,
            metadata_collection_id,
            options,
        })
    }

    fn conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepositoryError::LockPoisoned)
    }

    // === Document access ===

    fn load_document(conn: &Connection, key: &str) -> RepositoryResult<Option<Document>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT document_json FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_document(
        conn: &Connection,
        key: &str,
        kind: InstanceKind,
        header: &InstanceHeader,
        end1_guid: Option<&str>,
        end2_guid: Option<&str>,
        doc: &Document,
    ) -> RepositoryResult<()> {
        let json = serde_json::to_string(doc)?;
        conn.execute(
            r#"
            INSERT INTO documents
                (key, kind, type_name, status, version, end1_guid, end2_guid, document_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(key) DO UPDATE SET
                status = excluded.status,
                version = excluded.version,
                document_json = excluded.document_json
            "#,
            params![
                key,
                kind.as_str(),
                header.type_ref.name,
                header.status.as_str(),
                header.version as i64,
                end1_guid,
                end2_guid,
                json,
            ],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO document_history (key, version, document_json)
             VALUES (?1, ?2, ?3)",
            params![key, header.version as i64, json],
        )?;
        Ok(())
    }

    fn remove_document(conn: &Connection, key: &str) -> RepositoryResult<bool> {
        conn.execute("DELETE FROM document_history WHERE key = ?1", params![key])?;
        let rows = conn.execute("DELETE FROM documents WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    fn load_entity(conn: &Connection, guid: &str) -> RepositoryResult<Option<EntityDetail>> {
        match Self::load_document(conn, &entity_key(guid))? {
            Some(doc) => Ok(Some(entity_from_document(&doc)?)),
            None => Ok(None),
        }
    }

    /// The entity, unless it is absent or soft-deleted
    fn active_entity(conn: &Connection, guid: &str) -> RepositoryResult<EntityDetail> {
        match Self::load_entity(conn, guid)? {
            Some(entity) if !entity.header.is_deleted() => Ok(entity),
            _ => Err(RepositoryError::EntityNotKnown(guid.to_string())),
        }
    }

    fn save_entity(conn: &Connection, entity: &EntityDetail) -> RepositoryResult<()> {
        Self::write_document(
            conn,
            &entity_key(&entity.header.guid),
            InstanceKind::Entity,
            &entity.header,
            None,
            None,
            &entity_to_document(entity),
        )
    }

    fn load_relationship(conn: &Connection, guid: &str) -> RepositoryResult<Option<Relationship>> {
        match Self::load_document(conn, &relationship_key(guid))? {
            Some(doc) => Ok(Some(relationship_from_document(&doc)?)),
            None => Ok(None),
        }
    }

    fn active_relationship(conn: &Connection, guid: &str) -> RepositoryResult<Relationship> {
        match Self::load_relationship(conn, guid)? {
            Some(relationship) if !relationship.header.is_deleted() => Ok(relationship),
            _ => Err(RepositoryError::RelationshipNotKnown(guid.to_string())),
        }
    }

    fn save_relationship(conn: &Connection, relationship: &Relationship) -> RepositoryResult<()> {
        Self::write_document(
            conn,
            &relationship_key(&relationship.header.guid),
            InstanceKind::Relationship,
            &relationship.header,
            Some(relationship.end1.guid()),
            Some(relationship.end2.guid()),
            &relationship_to_document(relationship),
        )
    }

    /// Previous stored version of a document
    fn previous_version(
        conn: &Connection,
        key: &str,
        version: u64,
    ) -> RepositoryResult<Option<Document>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT document_json FROM document_history
                 WHERE key = ?1 AND version < ?2
                 ORDER BY version DESC LIMIT 1",
                params![key, version as i64],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    // === Type helpers ===

    fn typedef_of_category(
        &self,
        guid: &str,
        category: TypeDefCategory,
    ) -> RepositoryResult<TypeDef> {
        let def = self
            .types
            .get_by_guid(guid)
            .ok_or_else(|| RepositoryError::TypeDefNotKnown(guid.to_string()))?;
        if def.category() != category {
            return Err(RepositoryError::InvalidParameter(format!(
                "{} is a {}, not a {}",
                def.name,
                def.category(),
                category
            )));
        }
        Ok(def)
    }

    fn typedef_for(&self, header: &InstanceHeader) -> RepositoryResult<TypeDef> {
        self.types
            .get_by_name(&header.type_ref.name)
            .ok_or_else(|| RepositoryError::TypeDefNotKnown(header.type_ref.name.clone()))
    }

    /// Initial status for a new instance: requested or the type's default
    fn initial_status(
        def: &TypeDef,
        requested: Option<InstanceStatus>,
    ) -> RepositoryResult<InstanceStatus> {
        let status = requested.unwrap_or(def.initial_status);
        if status == InstanceStatus::Deleted || !def.supports_status(status) {
            return Err(RepositoryError::StatusNotSupported {
                status,
                type_name: def.name.clone(),
            });
        }
        Ok(status)
    }

    /// A status update may only move to a status the type declares
    fn check_new_status(def: &TypeDef, status: InstanceStatus) -> RepositoryResult<()> {
        if !def.supports_status(status) {
            return Err(RepositoryError::StatusNotSupported {
                status,
                type_name: def.name.clone(),
            });
        }
        Ok(())
    }

    fn check_type_matches(
        header: &InstanceHeader,
        type_guid: &str,
        type_name: &str,
    ) -> RepositoryResult<()> {
        if header.type_ref.guid != type_guid || header.type_ref.name != type_name {
            return Err(RepositoryError::InvalidParameter(format!(
                "instance {} is a {}, not {} ({})",
                header.guid, header.type_ref.name, type_name, type_guid
            )));
        }
        Ok(())
    }
}

impl OpenRepository for SqliteRepository {
    type Options = RepositoryOptions;

    fn open(path: impl AsRef<Path>, options: RepositoryOptions) -> RepositoryResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, options)
    }

    fn open_in_memory(options: RepositoryOptions) -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, options)
    }
}

impl MetadataCollection for SqliteRepository {
    fn metadata_collection_id(&self) -> &str {
        &self.metadata_collection_id
    }

    // === Type Operations ===

    fn get_all_types(&self) -> RepositoryResult<TypeDefGallery> {
        Ok(self.types.all())
    }

    fn find_types_by_name(&self, name: &str) -> RepositoryResult<TypeDefGallery> {
        Ok(self.types.find_by_name(name))
    }

    fn find_types_by_category(&self, category: TypeDefCategory) -> RepositoryResult<Vec<TypeDef>> {
        Ok(self.types.find_by_category(category))
    }

    fn find_types_by_external_id(
        &self,
        standard_name: Option<&str>,
        organization: Option<&str>,
        type_name: Option<&str>,
    ) -> RepositoryResult<Vec<TypeDef>> {
        self.types
            .find_by_external_id(standard_name, organization, type_name)
    }

    fn get_typedef_by_guid(&self, guid: &str) -> RepositoryResult<Option<TypeDef>> {
        Ok(self.types.get_by_guid(guid))
    }

    fn get_typedef_by_name(&self, name: &str) -> RepositoryResult<Option<TypeDef>> {
        Ok(self.types.get_by_name(name))
    }

    fn get_attribute_typedef_by_name(
        &self,
        name: &str,
    ) -> RepositoryResult<Option<AttributeTypeDef>> {
        Ok(self.types.get_attribute_type(name))
    }

    fn add_attribute_typedef(&self, def: &AttributeTypeDef) -> RepositoryResult<()> {
        self.types.register_attribute_type(def.clone())?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO attribute_typedefs (guid, name, definition_json) VALUES (?1, ?2, ?3)
             ON CONFLICT(guid) DO NOTHING",
            params![def.guid, def.name, serde_json::to_string(def)?],
        )?;
        debug!(attribute_type = %def.name, "attribute typedef added");
        Ok(())
    }

    fn add_typedef(&self, def: &TypeDef) -> RepositoryResult<()> {
        if self.types.verify(def)? {
            return Ok(());
        }
        self.types.register_type(def.clone())?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO typedefs (guid, name, category, version, definition_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                def.guid,
                def.name,
                def.category().as_str(),
                def.version as i64,
                serde_json::to_string(def)?,
            ],
        )?;
        debug!(type_name = %def.name, category = %def.category(), "typedef added");
        Ok(())
    }

    fn verify_typedef(&self, def: &TypeDef) -> RepositoryResult<bool> {
        self.types.verify(def)
    }

    fn patch_typedef(&self, patch: &TypeDefPatch) -> RepositoryResult<TypeDef> {
        let current = self
            .types
            .get_by_name(&patch.type_name)
            .ok_or_else(|| RepositoryError::TypeDefNotKnown(patch.type_name.clone()))?;
        let next = patch
            .apply_to(&current)
            .map_err(RepositoryError::InvalidParameter)?;
        self.types.replace_type(next.clone())?;

        let conn = self.conn()?;
        conn.execute(
            "UPDATE typedefs SET version = ?1, definition_json = ?2 WHERE guid = ?3",
            params![next.version as i64, serde_json::to_string(&next)?, next.guid],
        )?;
        info!(type_name = %next.name, version = next.version, "typedef patched");
        Ok(next)
    }

    // === Entity Operations ===

    fn is_entity_known(
        &self,
        _user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Option<EntityDetail>> {
        let conn = self.conn()?;
        Ok(Self::load_entity(&conn, guid)?.filter(|e| !e.header.is_deleted()))
    }

    fn get_entity_summary(&self, _user_id: &str, guid: &str) -> RepositoryResult<EntitySummary> {
        let conn = self.conn()?;
        Ok(Self::active_entity(&conn, guid)?.summary())
    }

    fn get_entity_detail(&self, _user_id: &str, guid: &str) -> RepositoryResult<EntityDetail> {
        let conn = self.conn()?;
        Self::active_entity(&conn, guid)
    }

    fn get_relationships_for_entity(
        &self,
        _user_id: &str,
        entity_guid: &str,
    ) -> RepositoryResult<Vec<Relationship>> {
        let conn = self.conn()?;
        Self::active_entity(&conn, entity_guid)?;

        let mut stmt = conn.prepare(
            "SELECT document_json FROM documents
             WHERE kind = ?1 AND status != ?2 AND (end1_guid = ?3 OR end2_guid = ?3)
             ORDER BY key",
        )?;
        let rows = stmt.query_map(
            params![
                InstanceKind::Relationship.as_str(),
                InstanceStatus::Deleted.as_str(),
                entity_guid
            ],
            |row| row.get::<_, String>(0),
        )?;

        let mut relationships = Vec::new();
        for row in rows {
            let doc: Document = serde_json::from_str(&row?)?;
            relationships.push(relationship_from_document(&doc)?);
        }
        Ok(relationships)
    }

    fn find_entities_by_property(
        &self,
        _user_id: &str,
        type_guid: Option<&str>,
        match_properties: &InstanceProperties,
    ) -> RepositoryResult<Vec<EntityDetail>> {
        let type_name = match type_guid {
            Some(guid) => Some(self.typedef_of_category(guid, TypeDefCategory::EntityDef)?.name),
            None => None,
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT document_json FROM documents WHERE kind = ?1 AND status != ?2 ORDER BY key",
        )?;
        let rows = stmt.query_map(
            params![InstanceKind::Entity.as_str(), InstanceStatus::Deleted.as_str()],
            |row| row.get::<_, String>(0),
        )?;

        let mut matches = Vec::new();
        for row in rows {
            let doc: Document = serde_json::from_str(&row?)?;
            let entity = entity_from_document(&doc)?;
            if let Some(wanted) = &type_name {
                if !self.types.is_type_of(&entity.header.type_ref.name, wanted) {
                    continue;
                }
            }
            let all_match = match_properties.iter().all(|(name, value)| {
                entity
                    .properties
                    .get(name)
                    .map(|v| v.to_comparable_value() == value.to_comparable_value())
                    .unwrap_or(false)
            });
            if all_match {
                matches.push(entity);
            }
        }
        Ok(matches)
    }

    fn add_entity(
        &self,
        user_id: &str,
        type_guid: &str,
        properties: InstanceProperties,
        initial_status: Option<InstanceStatus>,
    ) -> RepositoryResult<EntityDetail> {
        let def = self.typedef_of_category(type_guid, TypeDefCategory::EntityDef)?;
        let status = Self::initial_status(&def, initial_status)?;
        let properties = stored_properties(properties);
        self.types.validate_properties(&def.name, &properties, true)?;

        let entity = EntityDetail {
            header: InstanceHeader::new(&def, status, self.metadata_collection_id.clone(), user_id),
            classifications: Vec::new(),
            properties,
        };

        let conn = self.conn()?;
        Self::save_entity(&conn, &entity)?;
        debug!(guid = %entity.header.guid, type_name = %def.name, "entity added");
        Ok(entity)
    }

    fn update_entity_status(
        &self,
        user_id: &str,
        guid: &str,
        new_status: InstanceStatus,
    ) -> RepositoryResult<EntityDetail> {
        let conn = self.conn()?;
        let mut entity = Self::active_entity(&conn, guid)?;
        let def = self.typedef_for(&entity.header)?;
        Self::check_new_status(&def, new_status)?;

        entity.header.status = new_status;
        entity.header.bump(user_id);
        Self::save_entity(&conn, &entity)?;
        debug!(
            guid,
            status = %new_status,
            version = entity.header.version,
            "entity status updated"
        );
        Ok(entity)
    }

    fn update_entity_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail> {
        let conn = self.conn()?;
        let mut entity = Self::active_entity(&conn, guid)?;
        let properties = stored_properties(properties);
        self.types
            .validate_properties(&entity.header.type_ref.name, &properties, true)?;

        entity.properties = properties;
        entity.header.bump(user_id);
        Self::save_entity(&conn, &entity)?;
        debug!(guid, version = entity.header.version, "entity properties updated");
        Ok(entity)
    }

    fn undo_entity_update(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>> {
        if !self.options.undo {
            return Ok(Capability::NotSupported);
        }
        let conn = self.conn()?;
        let mut entity = Self::active_entity(&conn, guid)?;
        let previous = Self::previous_version(&conn, &entity_key(guid), entity.header.version)?
            .ok_or_else(|| {
                RepositoryError::InvalidParameter(format!("entity {} has no earlier version", guid))
            })?;
        let previous = entity_from_document(&previous)?;
        // undoing a restore would soft-delete outside delete_entity
        if previous.header.is_deleted() {
            return Err(RepositoryError::InvalidParameter(format!(
                "entity {} was restored after its last update; a restore cannot be undone",
                guid
            )));
        }

        entity.properties = previous.properties;
        entity.header.status = previous.header.status;
        entity.header.bump(user_id);
        Self::save_entity(&conn, &entity)?;
        debug!(guid, version = entity.header.version, "entity update undone");
        Ok(Capability::Supported(entity))
    }

    fn delete_entity(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>> {
        if !self.options.soft_delete {
            return Ok(Capability::NotSupported);
        }
        let conn = self.conn()?;
        let mut entity = Self::active_entity(&conn, guid)?;
        Self::check_type_matches(&entity.header, type_guid, type_name)?;

        entity.header.status_on_delete = Some(entity.header.status);
        entity.header.status = InstanceStatus::Deleted;
        entity.header.bump(user_id);
        Self::save_entity(&conn, &entity)?;
        debug!(guid, version = entity.header.version, "entity soft-deleted");
        Ok(Capability::Supported(entity))
    }

    fn restore_entity(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<EntityDetail>> {
        if !self.options.soft_delete {
            return Ok(Capability::NotSupported);
        }
        let conn = self.conn()?;
        let mut entity = Self::load_entity(&conn, guid)?
            .ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))?;
        if !entity.header.is_deleted() {
            return Err(RepositoryError::EntityNotDeleted(guid.to_string()));
        }
        let def = self.typedef_for(&entity.header)?;

        entity.header.status = entity
            .header
            .status_on_delete
            .take()
            .unwrap_or(def.initial_status);
        entity.header.bump(user_id);
        Self::save_entity(&conn, &entity)?;
        debug!(guid, version = entity.header.version, "entity restored");
        Ok(Capability::Supported(entity))
    }

    fn purge_entity(
        &self,
        _user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn()?;
        let entity = Self::load_entity(&conn, guid)?
            .ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))?;
        Self::check_type_matches(&entity.header, type_guid, type_name)?;

        let tx = conn.transaction()?;
        let attached: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT key FROM documents WHERE kind = ?1 AND (end1_guid = ?2 OR end2_guid = ?2)",
            )?;
            let keys = stmt
                .query_map(params![InstanceKind::Relationship.as_str(), guid], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            keys
        };
        for key in &attached {
            Self::remove_document(&tx, key)?;
        }
        Self::remove_document(&tx, &entity_key(guid))?;
        tx.commit()?;

        debug!(guid, relationships = attached.len(), "entity purged");
        Ok(())
    }

    fn classify_entity(
        &self,
        user_id: &str,
        entity_guid: &str,
        classification_name: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail> {
        let def = self
            .types
            .get_by_name(classification_name)
            .filter(|d| d.category() == TypeDefCategory::ClassificationDef)
            .ok_or_else(|| RepositoryError::TypeDefNotKnown(classification_name.to_string()))?;

        let conn = self.conn()?;
        let mut entity = Self::active_entity(&conn, entity_guid)?;
        if entity.classification(classification_name).is_some() {
            return Err(RepositoryError::ClassificationError(format!(
                "entity {} is already classified as {}",
                entity_guid, classification_name
            )));
        }
        if !self
            .types
            .classification_allowed(&def, &entity.header.type_ref.name)
        {
            return Err(RepositoryError::ClassificationError(format!(
                "{} cannot classify a {}",
                classification_name, entity.header.type_ref.name
            )));
        }
        let properties = stored_properties(properties);
        self.types
            .validate_properties(classification_name, &properties, true)?;

        entity
            .classifications
            .push(Classification::new(&def, properties, user_id));
        entity.header.bump(user_id);
        Self::save_entity(&conn, &entity)?;
        debug!(guid = entity_guid, classification = classification_name, "entity classified");
        Ok(entity)
    }

    fn declassify_entity(
        &self,
        user_id: &str,
        entity_guid: &str,
        classification_name: &str,
    ) -> RepositoryResult<EntityDetail> {
        let conn = self.conn()?;
        let mut entity = Self::active_entity(&conn, entity_guid)?;
        let position = entity
            .classifications
            .iter()
            .position(|c| c.name == classification_name)
            .ok_or_else(|| {
                RepositoryError::ClassificationError(format!(
                    "entity {} is not classified as {}",
                    entity_guid, classification_name
                ))
            })?;

        entity.classifications.remove(position);
        entity.header.bump(user_id);
        Self::save_entity(&conn, &entity)?;
        debug!(guid = entity_guid, classification = classification_name, "entity declassified");
        Ok(entity)
    }

    // === Relationship Operations ===

    fn is_relationship_known(
        &self,
        _user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Option<Relationship>> {
        let conn = self.conn()?;
        Ok(Self::load_relationship(&conn, guid)?.filter(|r| !r.header.is_deleted()))
    }

    fn get_relationship(&self, _user_id: &str, guid: &str) -> RepositoryResult<Relationship> {
        let conn = self.conn()?;
        Self::active_relationship(&conn, guid)
    }

    fn add_relationship(
        &self,
        user_id: &str,
        type_guid: &str,
        properties: InstanceProperties,
        end1_guid: &str,
        end2_guid: &str,
        initial_status: Option<InstanceStatus>,
    ) -> RepositoryResult<Relationship> {
        let def = self.typedef_of_category(type_guid, TypeDefCategory::RelationshipDef)?;
        let (end1_def, end2_def) = match &def.kind {
            TypeDefKind::RelationshipDef { end1, end2 } => (end1.clone(), end2.clone()),
            _ => {
                return Err(RepositoryError::InvalidParameter(format!(
                    "{} has no relationship ends",
                    def.name
                )))
            }
        };
        let status = Self::initial_status(&def, initial_status)?;
        let properties = stored_properties(properties);
        self.types.validate_properties(&def.name, &properties, true)?;

        let conn = self.conn()?;
        let mut proxies = Vec::with_capacity(2);
        for (guid, end_def) in [(end1_guid, &end1_def), (end2_guid, &end2_def)] {
            let entity = Self::active_entity(&conn, guid)?;
            let entity_type = &entity.header.type_ref.name;
            if !self.types.is_type_of(entity_type, &end_def.entity_type) {
                return Err(RepositoryError::InvalidParameter(format!(
                    "{} end {} must be a {}, not a {}",
                    def.name, end_def.attribute_name, end_def.entity_type, entity_type
                )));
            }
            let unique = self.types.unique_attribute_names(entity_type);
            proxies.push(entity.proxy(unique.iter().map(String::as_str)));
        }
        let end2 = proxies.pop();
        let end1 = proxies.pop();
        let (Some(end1), Some(end2)) = (end1, end2) else {
            return Err(RepositoryError::InvalidParameter("relationship ends".into()));
        };

        let relationship = Relationship {
            header: InstanceHeader::new(&def, status, self.metadata_collection_id.clone(), user_id),
            end1,
            end2,
            properties,
        };
        Self::save_relationship(&conn, &relationship)?;
        debug!(guid = %relationship.header.guid, type_name = %def.name, "relationship added");
        Ok(relationship)
    }

    fn update_relationship_status(
        &self,
        user_id: &str,
        guid: &str,
        new_status: InstanceStatus,
    ) -> RepositoryResult<Relationship> {
        let conn = self.conn()?;
        let mut relationship = Self::active_relationship(&conn, guid)?;
        let def = self.typedef_for(&relationship.header)?;
        Self::check_new_status(&def, new_status)?;

        relationship.header.status = new_status;
        relationship.header.bump(user_id);
        Self::save_relationship(&conn, &relationship)?;
        debug!(guid, status = %new_status, "relationship status updated");
        Ok(relationship)
    }

    fn update_relationship_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship> {
        let conn = self.conn()?;
        let mut relationship = Self::active_relationship(&conn, guid)?;
        let properties = stored_properties(properties);
        self.types
            .validate_properties(&relationship.header.type_ref.name, &properties, true)?;

        relationship.properties = properties;
        relationship.header.bump(user_id);
        Self::save_relationship(&conn, &relationship)?;
        debug!(guid, version = relationship.header.version, "relationship properties updated");
        Ok(relationship)
    }

    fn delete_relationship(
        &self,
        user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<Relationship>> {
        if !self.options.soft_delete {
            return Ok(Capability::NotSupported);
        }
        let conn = self.conn()?;
        let mut relationship = Self::active_relationship(&conn, guid)?;
        Self::check_type_matches(&relationship.header, type_guid, type_name)?;

        relationship.header.status_on_delete = Some(relationship.header.status);
        relationship.header.status = InstanceStatus::Deleted;
        relationship.header.bump(user_id);
        Self::save_relationship(&conn, &relationship)?;
        debug!(guid, "relationship soft-deleted");
        Ok(Capability::Supported(relationship))
    }

    fn restore_relationship(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Capability<Relationship>> {
        if !self.options.soft_delete {
            return Ok(Capability::NotSupported);
        }
        let conn = self.conn()?;
        let mut relationship = Self::load_relationship(&conn, guid)?
            .ok_or_else(|| RepositoryError::RelationshipNotKnown(guid.to_string()))?;
        if !relationship.header.is_deleted() {
            return Err(RepositoryError::RelationshipNotDeleted(guid.to_string()));
        }
        let def = self.typedef_for(&relationship.header)?;

        relationship.header.status = relationship
            .header
            .status_on_delete
            .take()
            .unwrap_or(def.initial_status);
        relationship.header.bump(user_id);
        Self::save_relationship(&conn, &relationship)?;
        debug!(guid, "relationship restored");
        Ok(Capability::Supported(relationship))
    }

    fn purge_relationship(
        &self,
        _user_id: &str,
        type_guid: &str,
        type_name: &str,
        guid: &str,
    ) -> RepositoryResult<()> {
        let conn = self.conn()?;
        let relationship = Self::load_relationship(&conn, guid)?
            .ok_or_else(|| RepositoryError::RelationshipNotKnown(guid.to_string()))?;
        Self::check_type_matches(&relationship.header, type_guid, type_name)?;
        Self::remove_document(&conn, &relationship_key(guid))?;
        debug!(guid, "relationship purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyValue;
    use crate::types::TypeCatalog;

    fn create_test_repository(options: RepositoryOptions) -> SqliteRepository {
        let repository = SqliteRepository::open_in_memory(options).unwrap();
        TypeCatalog::builtin().unwrap().load_into(&repository).unwrap();
        repository
    }

    fn guid_of(repository: &SqliteRepository, name: &str) -> String {
        repository.get_typedef_by_name(name).unwrap().unwrap().guid
    }

    fn term_properties(qualified_name: &str) -> InstanceProperties {
        let mut props = InstanceProperties::new();
        props.insert("qualifiedName".into(), PropertyValue::string(qualified_name));
        props.insert("displayName".into(), PropertyValue::string("Customer"));
        props
    }

    fn add_term(repository: &SqliteRepository, qualified_name: &str) -> EntityDetail {
        let type_guid = guid_of(repository, "GlossaryTerm");
        repository
            .add_entity("alice", &type_guid, term_properties(qualified_name), None)
            .unwrap()
    }

    #[test]
    fn new_entity_starts_at_version_one_with_initial_status() {
        let repository = create_test_repository(RepositoryOptions::default());
        let term = add_term(&repository, "term-1");
        assert_eq!(term.header.version, 1);
        assert_eq!(term.header.status, InstanceStatus::Draft);
        assert_eq!(term.header.provenance.created_by, "alice");
        assert_eq!(term.header.metadata_collection_id, repository.metadata_collection_id());

        let loaded = repository.get_entity_detail("alice", term.guid()).unwrap();
        assert_eq!(loaded, term);
    }

    #[test]
    fn missing_mandatory_property_is_rejected() {
        let repository = create_test_repository(RepositoryOptions::default());
        let type_guid = guid_of(&repository, "GlossaryTerm");
        let mut props = term_properties("term-1");
        props.remove("displayName");
        let result = repository.add_entity("alice", &type_guid, props, None);
        assert!(matches!(result, Err(RepositoryError::PropertyError(_))));
    }

    #[test]
    fn status_updates_bump_version_and_reject_deleted() {
        let repository = create_test_repository(RepositoryOptions::default());
        let term = add_term(&repository, "term-1");

        let updated = repository
            .update_entity_status("bob", term.guid(), InstanceStatus::Approved)
            .unwrap();
        assert_eq!(updated.header.version, 2);
        assert_eq!(updated.header.provenance.updated_by.as_deref(), Some("bob"));

        let rejected = repository.update_entity_status("bob", term.guid(), InstanceStatus::Deleted);
        assert!(matches!(rejected, Err(RepositoryError::StatusNotSupported { .. })));
        let current = repository.get_entity_detail("bob", term.guid()).unwrap();
        assert_eq!(current.header.version, 2);
    }

    #[test]
    fn soft_delete_restore_and_purge() {
        let repository = create_test_repository(RepositoryOptions::default());
        let term = add_term(&repository, "term-1");
        let type_ref = term.header.type_ref.clone();

        let deleted = repository
            .delete_entity("alice", &type_ref.guid, &type_ref.name, term.guid())
            .unwrap()
            .supported()
            .unwrap();
        assert_eq!(deleted.header.status, InstanceStatus::Deleted);
        assert_eq!(deleted.header.version, 2);
        assert!(matches!(
            repository.get_entity_detail("alice", term.guid()),
            Err(RepositoryError::EntityNotKnown(_))
        ));
        assert!(repository.is_entity_known("alice", term.guid()).unwrap().is_none());

        let restored = repository
            .restore_entity("alice", term.guid())
            .unwrap()
            .supported()
            .unwrap();
        assert_eq!(restored.header.version, 3);
        assert_eq!(restored.header.status, InstanceStatus::Draft);

        repository
            .purge_entity("alice", &type_ref.guid, &type_ref.name, term.guid())
            .unwrap();
        assert!(matches!(
            repository.get_entity_detail("alice", term.guid()),
            Err(RepositoryError::EntityNotKnown(_))
        ));
        assert!(matches!(
            repository.restore_entity("alice", term.guid()),
            Err(RepositoryError::EntityNotKnown(_))
        ));
    }

    #[test]
    fn disabled_capabilities_report_not_supported() {
        let options = RepositoryOptions {
            soft_delete: false,
            undo: false,
            ..Default::default()
        };
        let repository = create_test_repository(options);
        let term = add_term(&repository, "term-1");
        let type_ref = term.header.type_ref.clone();

        assert_eq!(
            repository.undo_entity_update("alice", term.guid()).unwrap(),
            Capability::NotSupported
        );
        assert_eq!(
            repository
                .delete_entity("alice", &type_ref.guid, &type_ref.name, term.guid())
                .unwrap(),
            Capability::NotSupported
        );
        assert!(repository.get_entity_detail("alice", term.guid()).is_ok());
    }

    #[test]
    fn undo_reverts_properties_with_a_new_version() {
        let repository = create_test_repository(RepositoryOptions::default());
        let term = add_term(&repository, "term-1");
        let mut changed = term_properties("term-1");
        changed.insert("summary".into(), PropertyValue::string("changed"));
        repository
            .update_entity_properties("bob", term.guid(), changed)
            .unwrap();

        let undone = repository
            .undo_entity_update("bob", term.guid())
            .unwrap()
            .supported()
            .unwrap();
        assert_eq!(undone.header.version, 3);
        assert_eq!(undone.properties, term.properties);
    }

    #[test]
    fn returned_entity_matches_what_reads_back() {
        let repository = create_test_repository(RepositoryOptions::default());
        let mut props = term_properties("term-1");
        props.insert("additionalProperties".into(), PropertyValue::Map(Default::default()));
        let added = repository
            .add_entity("alice", &guid_of(&repository, "GlossaryTerm"), props.clone(), None)
            .unwrap();
        assert!(!added.properties.contains_key("additionalProperties"));
        assert_eq!(added, repository.get_entity_detail("alice", added.guid()).unwrap());

        let updated = repository
            .update_entity_properties("alice", added.guid(), props)
            .unwrap();
        assert_eq!(updated, repository.get_entity_detail("alice", added.guid()).unwrap());
    }

    #[test]
    fn undo_does_not_reach_back_across_a_restore() {
        let repository = create_test_repository(RepositoryOptions::default());
        let term = add_term(&repository, "term-1");
        let def = repository.get_typedef_by_name("GlossaryTerm").unwrap().unwrap();
        repository
            .delete_entity("bob", &def.guid, &def.name, term.guid())
            .unwrap();
        repository.restore_entity("bob", term.guid()).unwrap();

        assert!(matches!(
            repository.undo_entity_update("bob", term.guid()),
            Err(RepositoryError::InvalidParameter(_))
        ));
        let current = repository.get_entity_detail("bob", term.guid()).unwrap();
        assert_eq!(current.header.version, 3);
        assert_eq!(current.header.status, term.header.status);
    }

    #[test]
    fn relationship_ends_keep_their_order() {
        let repository = create_test_repository(RepositoryOptions::default());
        let glossary_guid = guid_of(&repository, "Glossary");
        let mut glossary_props = InstanceProperties::new();
        glossary_props.insert("qualifiedName".into(), PropertyValue::string("glossary-1"));
        glossary_props.insert("displayName".into(), PropertyValue::string("Glossary"));
        let glossary = repository
            .add_entity("alice", &glossary_guid, glossary_props, None)
            .unwrap();
        let term = add_term(&repository, "term-1");

        let anchor_guid = guid_of(&repository, "TermAnchor");
        let relationship = repository
            .add_relationship(
                "alice",
                &anchor_guid,
                InstanceProperties::new(),
                glossary.guid(),
                term.guid(),
                None,
            )
            .unwrap();
        assert_eq!(relationship.end1.guid(), glossary.guid());
        assert_eq!(relationship.end2.guid(), term.guid());
        assert_eq!(relationship.end1.unique_properties.len(), 1);

        let swapped = repository.add_relationship(
            "alice",
            &anchor_guid,
            InstanceProperties::new(),
            term.guid(),
            glossary.guid(),
            None,
        );
        assert!(matches!(swapped, Err(RepositoryError::InvalidParameter(_))));

        let for_term = repository.get_relationships_for_entity("alice", term.guid()).unwrap();
        assert_eq!(for_term, vec![relationship.clone()]);

        repository
            .purge_entity("alice", &glossary.header.type_ref.guid, "Glossary", glossary.guid())
            .unwrap();
        assert!(repository
            .is_relationship_known("alice", relationship.guid())
            .unwrap()
            .is_none());
        assert!(repository
            .get_relationships_for_entity("alice", term.guid())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn classification_is_attached_and_removed() {
        let repository = create_test_repository(RepositoryOptions::default());
        let term = add_term(&repository, "term-1");
        let mut props = InstanceProperties::new();
        props.insert("level".into(), PropertyValue::int(2));

        let classified = repository
            .classify_entity("alice", term.guid(), "Confidentiality", props.clone())
            .unwrap();
        assert_eq!(classified.header.version, 2);
        assert_eq!(classified.classification("Confidentiality").unwrap().properties, props);

        let again = repository.classify_entity("alice", term.guid(), "Confidentiality", props);
        assert!(matches!(again, Err(RepositoryError::ClassificationError(_))));

        let declassified = repository
            .declassify_entity("alice", term.guid(), "Confidentiality")
            .unwrap();
        assert!(declassified.classifications.is_empty());
        assert_eq!(declassified.header.version, 3);
    }

    #[test]
    fn find_entities_by_property_matches_comparable_values() {
        let repository = create_test_repository(RepositoryOptions::default());
        add_term(&repository, "term-1");
        add_term(&repository, "term-2");

        let mut wanted = InstanceProperties::new();
        wanted.insert("qualifiedName".into(), PropertyValue::string("term-2"));
        let found = repository.find_entities_by_property("alice", None, &wanted).unwrap();
        assert_eq!(found.len(), 1);

        let referenceable = guid_of(&repository, "Referenceable");
        let all = repository
            .find_entities_by_property("alice", Some(&referenceable), &InstanceProperties::new())
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn types_and_collection_id_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("omrs.db");

        let (collection_id, term_guid) = {
            let repository = SqliteRepository::open(&path, RepositoryOptions::default()).unwrap();
            TypeCatalog::builtin().unwrap().load_into(&repository).unwrap();
            let term = add_term(&repository, "term-1");
            (repository.metadata_collection_id().to_string(), term.header.guid)
        };

        let reopened = SqliteRepository::open(&path, RepositoryOptions::default()).unwrap();
        assert_eq!(reopened.metadata_collection_id(), collection_id);
        assert!(reopened.get_typedef_by_name("GlossaryTerm").unwrap().is_some());
        assert!(reopened.get_entity_detail("alice", &term_guid).is_ok());

        let other = RepositoryOptions {
            metadata_collection_id: Some("someone-else".into()),
            ..Default::default()
        };
        assert!(SqliteRepository::open(&path, other).is_err());
    }

    #[test]
    fn patched_typedef_records_updater() {
        let repository = create_test_repository(RepositoryOptions::default());
        let patch = TypeDefPatch {
            type_name: "Glossary".into(),
            applied_by: "steward".into(),
            description: Some("A vocabulary".into()),
            new_version_name: None,
            new_attributes: vec![],
        };
        let patched = repository.patch_typedef(&patch).unwrap();
        assert_eq!(patched.version, 2);
        assert!(patched.updated_by.is_some());
        assert_eq!(
            repository.get_typedef_by_name("Glossary").unwrap(),
            Some(patched)
        );
    }
}
