//! In-memory reference backend.

use super::mime::{extract_body, MimePart};
use super::{
    Attachment, Backend, ComposeKind, DeviceInformation, GalEntry, GalResults, MeetingReply,
    OofSettings, OutgoingMail, SettingsReply, SettingsRequest,
};
use crate::error::{EngineError, EngineResult};
use crate::exchange::{Exporter, FolderChange, HierarchyImporter, Importer};
use crate::request::Credentials;
use crate::state::SyncState;
use airsync_protocol::tags::{base, calendar, email};
use airsync_protocol::{
    ChangeOperation, CommonStatus, ConflictPolicy, ContentParameters, Field, FolderEntry,
    FolderStatus, FolderType, MoveItemsStatus, SettingsStatus, SyncItem, SyncStatus,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredItem {
    item: SyncItem,
    version: u64,
    content_version: u64,
}

#[derive(Debug, Clone)]
struct StoredFolder {
    entry: FolderEntry,
    version: u64,
    items: BTreeMap<String, StoredItem>,
}

#[derive(Debug, Default)]
struct Inner {
    clock: u64,
    next_id: u64,
    folders: BTreeMap<String, StoredFolder>,
    users: HashMap<String, String>,
    denied_mailboxes: HashSet<String>,
    revoked_folders: HashSet<String>,
    unstreamable: HashSet<String>,
    sent: Vec<OutgoingMail>,
    meeting_replies: Vec<(String, MeetingReply)>,
    gal: Vec<GalEntry>,
    attachments: HashMap<String, Attachment>,
    oof: OofSettings,
    device_password: Option<String>,
    device_information: Option<DeviceInformation>,
    email_addresses: Vec<String>,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn folder_of_type(&self, folder_type: FolderType) -> Option<&StoredFolder> {
        self.folders
            .values()
            .find(|f| f.entry.folder_type == folder_type)
    }

    fn insert_item(&mut self, folder_id: &str, id: String, item: SyncItem) -> Option<u64> {
        let version = self.tick();
        let folder = self.folders.get_mut(folder_id)?;
        folder.items.insert(
            id,
            StoredItem {
                item,
                version,
                content_version: version,
            },
        );
        Some(version)
    }
}

/// Item versions a device has seen: server id to (version, content version).
type ItemCursor = BTreeMap<String, (u64, u64)>;

/// Folder versions a device has seen.
type FolderCursor = BTreeMap<String, u64>;

fn decode_cursor<T: DeserializeOwned + Default>(state: &SyncState) -> EngineResult<T> {
    if state.is_empty() {
        return Ok(T::default());
    }
    ciborium::from_reader(state.as_bytes())
        .map_err(|e| EngineError::HierarchyChanged(format!("unreadable sync state: {e}")))
}

fn encode_cursor<T: Serialize>(cursor: &T) -> EngineResult<SyncState> {
    let mut bytes = Vec::new();
    ciborium::into_writer(cursor, &mut bytes)
        .map_err(|e| EngineError::Fatal(format!("cannot write sync state: {e}")))?;
    Ok(SyncState::new(bytes))
}

/// A [`Backend`] holding every folder and item in process memory.
///
/// Every change stamps the item with a new version from a shared clock;
/// a sync state is the map of versions the device has seen, so exporters
/// derive the changes since a state by comparison. Filter types are not
/// applied.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    /// Creates a backend with no folders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with one folder of each default type.
    pub fn with_standard_folders() -> Self {
        let backend = Self::new();
        for (id, name, folder_type) in [
            ("inbox", "Inbox", FolderType::Inbox),
            ("drafts", "Drafts", FolderType::Drafts),
            ("trash", "Deleted Items", FolderType::WasteBasket),
            ("sent", "Sent Items", FolderType::SentMail),
            ("outbox", "Outbox", FolderType::Outbox),
            ("calendar", "Calendar", FolderType::Calendar),
            ("contacts", "Contacts", FolderType::Contacts),
            ("tasks", "Tasks", FolderType::Tasks),
            ("notes", "Notes", FolderType::Notes),
        ] {
            backend.add_folder(FolderEntry::new(id, "0", name, folder_type));
        }
        backend
    }

    /// Adds or replaces a folder.
    pub fn add_folder(&self, entry: FolderEntry) {
        let mut inner = self.inner.write();
        let version = inner.tick();
        let items = inner
            .folders
            .remove(&entry.server_id)
            .map(|f| f.items)
            .unwrap_or_default();
        inner.folders.insert(
            entry.server_id.clone(),
            StoredFolder {
                entry,
                version,
                items,
            },
        );
    }

    /// Removes a folder and its items.
    pub fn remove_folder(&self, folder_id: &str) -> bool {
        self.inner.write().folders.remove(folder_id).is_some()
    }

    /// Registers a user. Without users every logon succeeds.
    pub fn add_user(&self, user: &str, password: &str) {
        self.inner
            .write()
            .users
            .insert(user.to_string(), password.to_string());
    }

    /// Makes setup fail for a mailbox.
    pub fn deny_mailbox(&self, mailbox: &str) {
        self.inner.write().denied_mailboxes.insert(mailbox.to_string());
    }

    /// Withdraws access to a folder: no importer or exporter is handed out.
    pub fn revoke_folder(&self, folder_id: &str) {
        self.inner.write().revoked_folders.insert(folder_id.to_string());
    }

    /// Marks an item as not streamable.
    pub fn mark_unstreamable(&self, server_id: &str) {
        self.inner.write().unstreamable.insert(server_id.to_string());
    }

    /// Adds an item and returns its server id.
    pub fn add_item(&self, folder_id: &str, item: SyncItem) -> Option<String> {
        let mut inner = self.inner.write();
        if !inner.folders.contains_key(folder_id) {
            return None;
        }
        let id = inner.allocate_id("m");
        inner.insert_item(folder_id, id.clone(), item)?;
        Some(id)
    }

    /// Replaces the content of an item.
    pub fn update_item(&self, folder_id: &str, server_id: &str, item: SyncItem) -> bool {
        let mut inner = self.inner.write();
        let version = inner.tick();
        match inner
            .folders
            .get_mut(folder_id)
            .and_then(|f| f.items.get_mut(server_id))
        {
            Some(stored) => {
                stored.item = item;
                stored.version = version;
                stored.content_version = version;
                true
            }
            None => false,
        }
    }

    /// Sets the read flag of a mail item.
    pub fn set_read(&self, folder_id: &str, server_id: &str, read: bool) -> bool {
        let mut inner = self.inner.write();
        let version = inner.tick();
        match inner
            .folders
            .get_mut(folder_id)
            .and_then(|f| f.items.get_mut(server_id))
        {
            Some(stored) => {
                stored.item.set_text(email::READ, if read { "1" } else { "0" });
                stored.version = version;
                true
            }
            None => false,
        }
    }

    /// Deletes an item.
    pub fn remove_item(&self, folder_id: &str, server_id: &str) -> bool {
        self.inner
            .write()
            .folders
            .get_mut(folder_id)
            .and_then(|f| f.items.remove(server_id))
            .is_some()
    }

    /// Delivers a raw RFC 822 message into a folder as an unread mail.
    pub fn deliver_mime(&self, folder_id: &str, raw: &str) -> Option<String> {
        self.add_item(folder_id, mail_from_mime(&MimePart::parse(raw)))
    }

    /// Adds a directory entry.
    pub fn add_gal_entry(&self, entry: GalEntry) {
        self.inner.write().gal.push(entry);
    }

    /// Stores an attachment under a name.
    pub fn add_attachment(&self, name: &str, attachment: Attachment) {
        self.inner
            .write()
            .attachments
            .insert(name.to_string(), attachment);
    }

    /// Sets the addresses reported by UserInformation.
    pub fn set_email_addresses(&self, addresses: Vec<String>) {
        self.inner.write().email_addresses = addresses;
    }

    /// Messages submitted so far.
    pub fn sent_mail(&self) -> Vec<OutgoingMail> {
        self.inner.read().sent.clone()
    }

    /// Meeting replies given so far, by request id.
    pub fn meeting_replies(&self) -> Vec<(String, MeetingReply)> {
        self.inner.read().meeting_replies.clone()
    }

    /// Current out-of-office settings.
    pub fn oof(&self) -> OofSettings {
        self.inner.read().oof.clone()
    }

    /// Device information last reported.
    pub fn device_information(&self) -> Option<DeviceInformation> {
        self.inner.read().device_information.clone()
    }

    /// Device password last set.
    pub fn device_password(&self) -> Option<String> {
        self.inner.read().device_password.clone()
    }

    /// Loads an item.
    pub fn item(&self, folder_id: &str, server_id: &str) -> Option<SyncItem> {
        self.inner
            .read()
            .folders
            .get(folder_id)
            .and_then(|f| f.items.get(server_id))
            .map(|s| s.item.clone())
    }

    /// Number of items in a folder.
    pub fn item_count(&self, folder_id: &str) -> usize {
        self.inner
            .read()
            .folders
            .get(folder_id)
            .map_or(0, |f| f.items.len())
    }

    /// Current folder entry.
    pub fn folder(&self, folder_id: &str) -> Option<FolderEntry> {
        self.inner
            .read()
            .folders
            .get(folder_id)
            .map(|f| f.entry.clone())
    }

    fn is_available(&self, folder_id: &str) -> bool {
        let inner = self.inner.read();
        inner.folders.contains_key(folder_id) && !inner.revoked_folders.contains(folder_id)
    }
}

fn mail_from_mime(message: &MimePart) -> SyncItem {
    let mut item = SyncItem::new();
    for (tag, header) in [
        (email::SUBJECT, "subject"),
        (email::FROM, "from"),
        (email::TO, "to"),
        (email::CC, "cc"),
        (email::REPLY_TO, "reply-to"),
        (email::DATE_RECEIVED, "date"),
    ] {
        if let Some(value) = message.header(header) {
            item.set_text(tag, value);
        }
    }
    if let Some(to) = message.header("to") {
        item.set_text(email::DISPLAY_TO, to);
    }
    item.set_text(email::MESSAGE_CLASS, "IPM.Note");
    item.set_text(email::READ, "0");
    item.set(Field::nested(
        base::BODY,
        vec![
            Field::text(base::TYPE, "1"),
            Field::text(base::DATA, extract_body(message).replace('\n', "\r\n")),
        ],
    ));
    item
}

impl Backend for MemoryBackend {
    fn logon(&self, credentials: &Credentials) -> EngineResult<bool> {
        let inner = self.inner.read();
        Ok(inner.users.is_empty()
            || inner.users.get(&credentials.user) == Some(&credentials.password))
    }

    fn setup(&self, mailbox: &str, device_id: &str, version: &str) -> EngineResult<bool> {
        debug!(mailbox, device_id, version, "backend setup");
        Ok(!self.inner.read().denied_mailboxes.contains(mailbox))
    }

    fn hierarchy(&self) -> EngineResult<Vec<FolderEntry>> {
        Ok(self
            .inner
            .read()
            .folders
            .values()
            .map(|f| f.entry.clone())
            .collect())
    }

    fn importer(&self, folder_id: &str) -> EngineResult<Option<Box<dyn Importer + '_>>> {
        if !self.is_available(folder_id) {
            return Ok(None);
        }
        Ok(Some(Box::new(MemoryImporter {
            inner: &self.inner,
            folder_id: folder_id.to_string(),
            cursor: ItemCursor::new(),
            conflict: ConflictPolicy::default(),
            conflicts: BTreeSet::new(),
        })))
    }

    fn hierarchy_importer(&self) -> EngineResult<Box<dyn HierarchyImporter + '_>> {
        Ok(Box::new(MemoryHierarchyImporter {
            inner: &self.inner,
            cursor: FolderCursor::new(),
        }))
    }

    fn exporter(&self, folder_id: &str) -> EngineResult<Option<Box<dyn Exporter<SyncItem> + '_>>> {
        if !self.is_available(folder_id) {
            return Ok(None);
        }
        Ok(Some(Box::new(MemoryExporter {
            inner: &self.inner,
            folder_id: folder_id.to_string(),
            cursor: ItemCursor::new(),
            pending: VecDeque::new(),
        })))
    }

    fn hierarchy_exporter(&self) -> EngineResult<Box<dyn Exporter<FolderEntry> + '_>> {
        Ok(Box::new(MemoryHierarchyExporter {
            inner: &self.inner,
            cursor: FolderCursor::new(),
            pending: VecDeque::new(),
        }))
    }

    fn fetch(
        &self,
        folder_id: &str,
        server_id: &str,
        _params: &ContentParameters,
    ) -> EngineResult<Option<SyncItem>> {
        Ok(self.item(folder_id, server_id))
    }

    fn send_mail(&self, mail: &OutgoingMail) -> EngineResult<()> {
        if mail.rfc822.is_empty() {
            return Err(EngineError::status(CommonStatus::InvalidMime, "empty message"));
        }
        let raw = String::from_utf8(mail.rfc822.clone())
            .map_err(|_| EngineError::status(CommonStatus::InvalidMime, "message is not UTF-8"))?;

        let mut inner = self.inner.write();
        if mail.kind != ComposeKind::New {
            let parent = mail.parent.as_ref().ok_or_else(|| {
                EngineError::status(CommonStatus::ItemNotFound, "no parent item given")
            })?;
            let found = inner.folders.iter().any(|(id, folder)| {
                parent.folder_id.as_deref().map_or(true, |f| f == id.as_str())
                    && folder.items.contains_key(&parent.item_id)
            });
            if !found {
                return Err(EngineError::status(
                    CommonStatus::ItemNotFound,
                    format!("parent item {} not found", parent.item_id),
                ));
            }
        }

        if mail.save_in_sent {
            if let Some(sent_id) = inner
                .folder_of_type(FolderType::SentMail)
                .map(|f| f.entry.server_id.clone())
            {
                let mut item = mail_from_mime(&MimePart::parse(&raw));
                item.set_text(email::READ, "1");
                let id = inner.allocate_id("m");
                inner.insert_item(&sent_id, id, item);
            }
        }
        inner.sent.push(mail.clone());
        Ok(())
    }

    fn waste_basket(&self) -> EngineResult<Option<String>> {
        Ok(self
            .inner
            .read()
            .folder_of_type(FolderType::WasteBasket)
            .map(|f| f.entry.server_id.clone()))
    }

    fn meeting_response(
        &self,
        request_id: &str,
        folder_id: &str,
        reply: MeetingReply,
    ) -> EngineResult<Option<String>> {
        let mut inner = self.inner.write();
        let calendar_id = match inner.folder_of_type(FolderType::Calendar) {
            Some(folder) => folder.entry.server_id.clone(),
            None => return Ok(None),
        };
        let request = match inner
            .folders
            .get_mut(folder_id)
            .and_then(|f| f.items.remove(request_id))
        {
            Some(stored) => stored.item,
            None => return Ok(None),
        };
        let mut event = SyncItem::new();
        if let Some(subject) = request.text(email::SUBJECT) {
            event.set_text(calendar::SUBJECT, subject);
        }
        let id = inner.allocate_id("m");
        inner.insert_item(&calendar_id, id.clone(), event);
        inner.meeting_replies.push((request_id.to_string(), reply));
        Ok(Some(id))
    }

    fn settings(&self, request: &SettingsRequest) -> EngineResult<SettingsReply> {
        let mut inner = self.inner.write();
        let reply = match request {
            SettingsRequest::OofGet { .. } => SettingsReply {
                oof: Some(inner.oof.clone()),
                ..SettingsReply::status(SettingsStatus::Success)
            },
            SettingsRequest::OofSet(oof) => {
                if oof.state > 2 {
                    return Ok(SettingsReply::status(SettingsStatus::InvalidArguments));
                }
                inner.oof = oof.clone();
                SettingsReply::status(SettingsStatus::Success)
            }
            SettingsRequest::DevicePassword(password) => {
                inner.device_password = Some(password.clone());
                SettingsReply::status(SettingsStatus::Success)
            }
            SettingsRequest::DeviceInformation(info) => {
                inner.device_information = Some(info.clone());
                SettingsReply::status(SettingsStatus::Success)
            }
            SettingsRequest::UserInformation => SettingsReply {
                email_addresses: inner.email_addresses.clone(),
                ..SettingsReply::status(SettingsStatus::Success)
            },
        };
        Ok(reply)
    }

    fn attachment_data(&self, name: &str) -> EngineResult<Option<Attachment>> {
        Ok(self.inner.read().attachments.get(name).cloned())
    }

    fn search_gal(&self, query: &str, range: (usize, usize)) -> EngineResult<GalResults> {
        let needle = query.to_lowercase();
        let inner = self.inner.read();
        let matches: Vec<&GalEntry> = inner
            .gal
            .iter()
            .filter(|entry| {
                [
                    &entry.display_name,
                    &entry.alias,
                    &entry.first_name,
                    &entry.last_name,
                    &entry.email_address,
                ]
                .into_iter()
                .flatten()
                .any(|value| value.to_lowercase().contains(&needle))
            })
            .collect();

        let total = matches.len();
        if total == 0 || range.0 >= total {
            return Ok(GalResults {
                entries: Vec::new(),
                range: (range.0, range.0),
                total,
            });
        }
        let end = range.1.min(total - 1);
        Ok(GalResults {
            entries: matches[range.0..=end].iter().map(|e| (*e).clone()).collect(),
            range: (range.0, end),
            total,
        })
    }

    fn is_streamable(&self, server_id: &str, _item: &SyncItem) -> bool {
        !self.inner.read().unstreamable.contains(server_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Pending {
    Add,
    Modify,
    ReadFlag,
    Remove,
}

struct MemoryExporter<'a> {
    inner: &'a RwLock<Inner>,
    folder_id: String,
    cursor: ItemCursor,
    pending: VecDeque<(String, Pending)>,
}

impl Exporter<SyncItem> for MemoryExporter<'_> {
    fn configure(&mut self, state: &SyncState, _params: &ContentParameters) -> EngineResult<()> {
        self.cursor = decode_cursor(state)?;
        let inner = self.inner.read();
        let folder = inner
            .folders
            .get(&self.folder_id)
            .ok_or_else(|| EngineError::HierarchyChanged(format!("folder {} is gone", self.folder_id)))?;

        let mut changed: Vec<(u64, String, Pending)> = Vec::new();
        for (id, stored) in &folder.items {
            match self.cursor.get(id) {
                None => changed.push((stored.version, id.clone(), Pending::Add)),
                Some(&(seen, _)) if stored.version <= seen => {}
                Some(&(_, seen_content)) if stored.content_version <= seen_content => {
                    changed.push((stored.version, id.clone(), Pending::ReadFlag))
                }
                Some(_) => changed.push((stored.version, id.clone(), Pending::Modify)),
            }
        }
        changed.sort();
        self.pending = changed.into_iter().map(|(_, id, kind)| (id, kind)).collect();
        self.pending.extend(
            self.cursor
                .keys()
                .filter(|id| !folder.items.contains_key(*id))
                .map(|id| (id.clone(), Pending::Remove)),
        );
        debug!(folder = %self.folder_id, changes = self.pending.len(), "exporter configured");
        Ok(())
    }

    fn change_count(&self) -> usize {
        self.pending.len()
    }

    fn next_change(&mut self) -> EngineResult<Option<ChangeOperation<SyncItem>>> {
        let Some((id, kind)) = self.pending.pop_front() else {
            return Ok(None);
        };
        let inner = self.inner.read();
        let stored = inner
            .folders
            .get(&self.folder_id)
            .and_then(|f| f.items.get(&id));

        let change = match (kind, stored) {
            (Pending::Remove, _) | (_, None) => {
                self.cursor.remove(&id);
                ChangeOperation::Remove { server_id: id }
            }
            (kind, Some(stored)) => {
                self.cursor
                    .insert(id.clone(), (stored.version, stored.content_version));
                match kind {
                    Pending::Add => ChangeOperation::Add {
                        client_id: None,
                        server_id: Some(id),
                        payload: stored.item.clone(),
                    },
                    Pending::ReadFlag => {
                        let mut payload = SyncItem::new();
                        if let Some(read) = stored.item.text(email::READ) {
                            payload.set_text(email::READ, read);
                        }
                        ChangeOperation::Modify {
                            server_id: id,
                            payload,
                        }
                    }
                    _ => ChangeOperation::Modify {
                        server_id: id,
                        payload: stored.item.clone(),
                    },
                }
            }
        };
        Ok(Some(change))
    }

    fn state(&self) -> EngineResult<SyncState> {
        encode_cursor(&self.cursor)
    }
}

struct MemoryImporter<'a> {
    inner: &'a RwLock<Inner>,
    folder_id: String,
    cursor: ItemCursor,
    conflict: ConflictPolicy,
    conflicts: BTreeSet<String>,
}

impl MemoryImporter<'_> {
    fn is_conflict(&self, server_id: &str) -> bool {
        self.conflict.server_wins() && self.conflicts.contains(server_id)
    }

    fn not_found(&self, server_id: &str) -> EngineError {
        EngineError::status(
            SyncStatus::ObjectNotFound,
            format!("item {server_id} not in folder {}", self.folder_id),
        )
    }
}

impl Importer for MemoryImporter<'_> {
    fn configure(&mut self, state: &SyncState, conflict: ConflictPolicy) -> EngineResult<()> {
        self.cursor = decode_cursor(state)?;
        self.conflict = conflict;
        Ok(())
    }

    fn load_conflicts(&mut self, _params: &ContentParameters, state: &SyncState) -> EngineResult<()> {
        let seen: ItemCursor = decode_cursor(state)?;
        let inner = self.inner.read();
        let Some(folder) = inner.folders.get(&self.folder_id) else {
            return Ok(());
        };
        self.conflicts = seen
            .iter()
            .filter(|(id, (version, _))| {
                folder
                    .items
                    .get(*id)
                    .map_or(true, |stored| stored.version > *version)
            })
            .map(|(id, _)| id.clone())
            .collect();
        Ok(())
    }

    fn import_message_change(
        &mut self,
        server_id: Option<&str>,
        item: &SyncItem,
    ) -> EngineResult<String> {
        let mut inner = self.inner.write();
        let version = inner.tick();
        let id = match server_id {
            Some(id) => {
                if self.is_conflict(id) {
                    debug!(id, "client change lost to server change");
                    return Ok(id.to_string());
                }
                let stored = inner
                    .folders
                    .get_mut(&self.folder_id)
                    .and_then(|f| f.items.get_mut(id))
                    .ok_or_else(|| self.not_found(id))?;
                stored.item = item.clone();
                stored.version = version;
                stored.content_version = version;
                id.to_string()
            }
            None => {
                if !inner.folders.contains_key(&self.folder_id) {
                    return Err(EngineError::HierarchyChanged(format!(
                        "folder {} is gone",
                        self.folder_id
                    )));
                }
                let id = inner.allocate_id("m");
                inner.insert_item(&self.folder_id, id.clone(), item.clone());
                id
            }
        };
        let stamp = inner
            .folders
            .get(&self.folder_id)
            .and_then(|f| f.items.get(&id))
            .map(|s| (s.version, s.content_version));
        if let Some(stamp) = stamp {
            self.cursor.insert(id.clone(), stamp);
        }
        Ok(id)
    }

    fn import_message_deletion(&mut self, server_id: &str) -> EngineResult<()> {
        let mut inner = self.inner.write();
        let folder = inner
            .folders
            .get_mut(&self.folder_id)
            .ok_or_else(|| self.not_found(server_id))?;
        if !folder.items.contains_key(server_id) {
            return Err(self.not_found(server_id));
        }
        if self.is_conflict(server_id) {
            // the item goes back to the client as an add
            self.cursor.remove(server_id);
            return Ok(());
        }
        folder.items.remove(server_id);
        self.cursor.remove(server_id);
        Ok(())
    }

    fn import_message_read_flag(&mut self, server_id: &str, read: bool) -> EngineResult<()> {
        if self.is_conflict(server_id) {
            return Ok(());
        }
        let mut inner = self.inner.write();
        let version = inner.tick();
        let stored = inner
            .folders
            .get_mut(&self.folder_id)
            .and_then(|f| f.items.get_mut(server_id))
            .ok_or_else(|| self.not_found(server_id))?;
        stored.item.set_text(email::READ, if read { "1" } else { "0" });
        stored.version = version;
        self.cursor
            .insert(server_id.to_string(), (stored.version, stored.content_version));
        Ok(())
    }

    fn import_message_move(&mut self, server_id: &str, destination: &str) -> EngineResult<String> {
        let mut inner = self.inner.write();
        if !inner.folders.contains_key(destination) {
            return Err(EngineError::status(
                MoveItemsStatus::InvalidDestinationId,
                format!("destination {destination} not found"),
            ));
        }
        if destination == self.folder_id {
            return Err(EngineError::status(
                MoveItemsStatus::SameSourceAndDestination,
                "source and destination are the same",
            ));
        }
        let stored = inner
            .folders
            .get_mut(&self.folder_id)
            .and_then(|f| f.items.remove(server_id))
            .ok_or_else(|| {
                EngineError::status(
                    MoveItemsStatus::InvalidSourceId,
                    format!("item {server_id} not in folder {}", self.folder_id),
                )
            })?;
        self.cursor.remove(server_id);
        let id = inner.allocate_id("m");
        inner.insert_item(destination, id.clone(), stored.item);
        Ok(id)
    }

    fn state(&self) -> EngineResult<SyncState> {
        encode_cursor(&self.cursor)
    }
}

struct MemoryHierarchyExporter<'a> {
    inner: &'a RwLock<Inner>,
    cursor: FolderCursor,
    pending: VecDeque<(String, bool)>,
}

impl Exporter<FolderEntry> for MemoryHierarchyExporter<'_> {
    fn configure(&mut self, state: &SyncState, _params: &ContentParameters) -> EngineResult<()> {
        self.cursor = decode_cursor(state)?;
        let inner = self.inner.read();
        let mut changed: Vec<(u64, String)> = inner
            .folders
            .values()
            .filter(|f| {
                self.cursor
                    .get(&f.entry.server_id)
                    .map_or(true, |seen| f.version > *seen)
            })
            .map(|f| (f.version, f.entry.server_id.clone()))
            .collect();
        changed.sort();
        self.pending = changed.into_iter().map(|(_, id)| (id, true)).collect();
        self.pending.extend(
            self.cursor
                .keys()
                .filter(|id| !inner.folders.contains_key(*id))
                .map(|id| (id.clone(), false)),
        );
        Ok(())
    }

    fn change_count(&self) -> usize {
        self.pending.len()
    }

    fn next_change(&mut self) -> EngineResult<Option<ChangeOperation<FolderEntry>>> {
        let Some((id, present)) = self.pending.pop_front() else {
            return Ok(None);
        };
        let inner = self.inner.read();
        match inner.folders.get(&id).filter(|_| present) {
            Some(folder) => {
                let known = self.cursor.insert(id.clone(), folder.version).is_some();
                let payload = folder.entry.clone();
                Ok(Some(if known {
                    ChangeOperation::Modify {
                        server_id: id,
                        payload,
                    }
                } else {
                    ChangeOperation::Add {
                        client_id: None,
                        server_id: Some(id),
                        payload,
                    }
                }))
            }
            None => {
                self.cursor.remove(&id);
                Ok(Some(ChangeOperation::Remove { server_id: id }))
            }
        }
    }

    fn state(&self) -> EngineResult<SyncState> {
        encode_cursor(&self.cursor)
    }
}

struct MemoryHierarchyImporter<'a> {
    inner: &'a RwLock<Inner>,
    cursor: FolderCursor,
}

impl HierarchyImporter for MemoryHierarchyImporter<'_> {
    fn configure(&mut self, state: &SyncState) -> EngineResult<()> {
        self.cursor = decode_cursor(state)?;
        Ok(())
    }

    fn import_folder_change(&mut self, change: &FolderChange) -> EngineResult<FolderEntry> {
        let mut inner = self.inner.write();
        if change.parent_id != "0" && !inner.folders.contains_key(&change.parent_id) {
            return Err(EngineError::status(
                FolderStatus::ParentDoesNotExist,
                format!("parent {} not found", change.parent_id),
            ));
        }
        let duplicate = inner.folders.values().any(|f| {
            f.entry.parent_id == change.parent_id
                && f.entry.display_name == change.display_name
                && Some(&f.entry.server_id) != change.server_id.as_ref()
        });
        if duplicate {
            return Err(EngineError::status(
                FolderStatus::FolderExists,
                format!("folder {} exists", change.display_name),
            ));
        }

        let version = inner.tick();
        let entry = match &change.server_id {
            Some(id) => {
                let folder = inner.folders.get_mut(id).ok_or_else(|| {
                    EngineError::status(FolderStatus::FolderDoesNotExist, format!("folder {id} not found"))
                })?;
                if folder.entry.folder_type.is_system() {
                    return Err(EngineError::status(
                        FolderStatus::SystemFolder,
                        format!("folder {id} is a system folder"),
                    ));
                }
                folder.entry.parent_id = change.parent_id.clone();
                folder.entry.display_name = change.display_name.clone();
                folder.version = version;
                folder.entry.clone()
            }
            None => {
                let id = inner.allocate_id("f");
                let entry = FolderEntry::new(
                    id.clone(),
                    change.parent_id.clone(),
                    change.display_name.clone(),
                    change.folder_type,
                );
                inner.folders.insert(
                    id,
                    StoredFolder {
                        entry: entry.clone(),
                        version,
                        items: BTreeMap::new(),
                    },
                );
                entry
            }
        };
        self.cursor.insert(entry.server_id.clone(), version);
        Ok(entry)
    }

    fn import_folder_deletion(&mut self, server_id: &str) -> EngineResult<()> {
        let mut inner = self.inner.write();
        let folder = inner.folders.get(server_id).ok_or_else(|| {
            EngineError::status(FolderStatus::FolderDoesNotExist, format!("folder {server_id} not found"))
        })?;
        if folder.entry.folder_type.is_system() {
            return Err(EngineError::status(
                FolderStatus::SystemFolder,
                format!("folder {server_id} is a system folder"),
            ));
        }
        inner.folders.remove(server_id);
        self.cursor.remove(server_id);
        Ok(())
    }

    fn state(&self) -> EngineResult<SyncState> {
        encode_cursor(&self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{pump, DiscardSink};
    use airsync_protocol::ContentClass;

    fn mail(subject: &str) -> SyncItem {
        SyncItem::new()
            .with_text(email::SUBJECT, subject)
            .with_text(email::READ, "0")
    }

    fn export_all(backend: &MemoryBackend, folder: &str, state: &SyncState) -> (Vec<ChangeOperation<SyncItem>>, SyncState) {
        let mut exporter = backend.exporter(folder).unwrap().unwrap();
        exporter
            .configure(state, &ContentParameters::for_class(ContentClass::Email))
            .unwrap();
        let mut changes = Vec::new();
        while let Some(change) = exporter.next_change().unwrap() {
            changes.push(change);
        }
        (changes, exporter.state().unwrap())
    }

    #[test]
    fn exporter_reports_changes_since_state() {
        let backend = MemoryBackend::with_standard_folders();
        let a = backend.add_item("inbox", mail("a")).unwrap();
        let b = backend.add_item("inbox", mail("b")).unwrap();

        let (changes, state) = export_all(&backend, "inbox", &SyncState::empty());
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].server_id(), Some(a.as_str()));

        backend.set_read("inbox", &a, true);
        backend.update_item("inbox", &b, mail("b2"));
        let (changes, state) = export_all(&backend, "inbox", &state);
        assert_eq!(
            changes[0],
            ChangeOperation::Modify {
                server_id: a.clone(),
                payload: SyncItem::new().with_text(email::READ, "1"),
            }
        );
        assert_eq!(changes[1].payload().and_then(|p| p.text(email::SUBJECT)), Some("b2"));

        backend.remove_item("inbox", &a);
        let (changes, state) = export_all(&backend, "inbox", &state);
        assert_eq!(changes, vec![ChangeOperation::Remove { server_id: a }]);

        let (changes, _) = export_all(&backend, "inbox", &state);
        assert!(changes.is_empty());
    }

    #[test]
    fn partial_export_state_covers_delivered_changes_only() {
        let backend = MemoryBackend::with_standard_folders();
        for i in 0..3 {
            backend.add_item("inbox", mail(&format!("m{i}")));
        }
        let mut exporter = backend.exporter("inbox").unwrap().unwrap();
        exporter
            .configure(&SyncState::empty(), &ContentParameters::default())
            .unwrap();
        let mut sink = DiscardSink::new();
        pump(exporter.as_mut(), &mut sink, Some(2)).unwrap();
        let state = exporter.state().unwrap();
        drop(exporter);

        let (changes, _) = export_all(&backend, "inbox", &state);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn imported_changes_are_not_echoed() {
        let backend = MemoryBackend::with_standard_folders();
        let mut importer = backend.importer("inbox").unwrap().unwrap();
        importer
            .configure(&SyncState::empty(), ConflictPolicy::ServerWins)
            .unwrap();
        let id = importer.import_message_change(None, &mail("new")).unwrap();
        let state = importer.state().unwrap();
        drop(importer);

        assert_eq!(backend.item_count("inbox"), 1);
        assert!(backend.item("inbox", &id).is_some());
        let (changes, _) = export_all(&backend, "inbox", &state);
        assert!(changes.is_empty());
    }

    #[test]
    fn server_wins_keeps_server_change() {
        let backend = MemoryBackend::with_standard_folders();
        let id = backend.add_item("inbox", mail("original")).unwrap();
        let (_, state) = export_all(&backend, "inbox", &SyncState::empty());
        backend.update_item("inbox", &id, mail("server"));

        let mut importer = backend.importer("inbox").unwrap().unwrap();
        importer.configure(&state, ConflictPolicy::ServerWins).unwrap();
        importer
            .load_conflicts(&ContentParameters::default(), &state)
            .unwrap();
        importer
            .import_message_change(Some(&id), &mail("client"))
            .unwrap();
        let state = importer.state().unwrap();
        drop(importer);

        assert_eq!(
            backend.item("inbox", &id).unwrap().text(email::SUBJECT),
            Some("server")
        );
        let (changes, _) = export_all(&backend, "inbox", &state);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn client_wins_overwrites() {
        let backend = MemoryBackend::with_standard_folders();
        let id = backend.add_item("inbox", mail("original")).unwrap();
        let (_, state) = export_all(&backend, "inbox", &SyncState::empty());
        backend.update_item("inbox", &id, mail("server"));

        let mut importer = backend.importer("inbox").unwrap().unwrap();
        importer.configure(&state, ConflictPolicy::ClientWins).unwrap();
        importer
            .load_conflicts(&ContentParameters::default(), &state)
            .unwrap();
        importer
            .import_message_change(Some(&id), &mail("client"))
            .unwrap();
        drop(importer);

        assert_eq!(
            backend.item("inbox", &id).unwrap().text(email::SUBJECT),
            Some("client")
        );
    }

    #[test]
    fn missing_item_is_not_found() {
        let backend = MemoryBackend::with_standard_folders();
        let mut importer = backend.importer("inbox").unwrap().unwrap();
        importer
            .configure(&SyncState::empty(), ConflictPolicy::ServerWins)
            .unwrap();
        let err = importer.import_message_deletion("nope").unwrap_err();
        assert_eq!(err.status_code(), Some(SyncStatus::ObjectNotFound.code()));
    }

    #[test]
    fn move_statuses() {
        let backend = MemoryBackend::with_standard_folders();
        let id = backend.add_item("inbox", mail("a")).unwrap();
        let mut importer = backend.importer("inbox").unwrap().unwrap();
        importer
            .configure(&SyncState::empty(), ConflictPolicy::ServerWins)
            .unwrap();

        let err = importer.import_message_move(&id, "nowhere").unwrap_err();
        assert_eq!(err.status_code(), Some(MoveItemsStatus::InvalidDestinationId.code()));
        let err = importer.import_message_move(&id, "inbox").unwrap_err();
        assert_eq!(err.status_code(), Some(MoveItemsStatus::SameSourceAndDestination.code()));

        let new_id = importer.import_message_move(&id, "trash").unwrap();
        drop(importer);
        assert!(backend.item("trash", &new_id).is_some());
        assert_eq!(backend.item_count("inbox"), 0);
    }

    #[test]
    fn revoked_folder_has_no_exporter() {
        let backend = MemoryBackend::with_standard_folders();
        backend.revoke_folder("inbox");
        assert!(backend.exporter("inbox").unwrap().is_none());
        assert!(backend.importer("inbox").unwrap().is_none());
        assert!(backend.exporter("nope").unwrap().is_none());
    }

    #[test]
    fn unreadable_cursor_requires_resync() {
        let backend = MemoryBackend::with_standard_folders();
        let mut exporter = backend.exporter("inbox").unwrap().unwrap();
        let err = exporter
            .configure(&SyncState::new(vec![0xff, 0x00]), &ContentParameters::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::HierarchyChanged(_)));
    }

    #[test]
    fn hierarchy_import_rules() {
        let backend = MemoryBackend::with_standard_folders();
        let mut importer = backend.hierarchy_importer().unwrap();
        let created = importer
            .import_folder_change(&FolderChange {
                server_id: None,
                parent_id: "inbox".into(),
                display_name: "Work".into(),
                folder_type: FolderType::UserMail,
            })
            .unwrap();
        assert_eq!(created.parent_id, "inbox");

        let err = importer
            .import_folder_change(&FolderChange {
                server_id: None,
                parent_id: "inbox".into(),
                display_name: "Work".into(),
                folder_type: FolderType::UserMail,
            })
            .unwrap_err();
        assert_eq!(err.status_code(), Some(FolderStatus::FolderExists.code()));

        let err = importer.import_folder_deletion("inbox").unwrap_err();
        assert_eq!(err.status_code(), Some(FolderStatus::SystemFolder.code()));

        importer.import_folder_deletion(&created.server_id).unwrap();
        let err = importer.import_folder_deletion(&created.server_id).unwrap_err();
        assert_eq!(err.status_code(), Some(FolderStatus::FolderDoesNotExist.code()));
    }

    #[test]
    fn hierarchy_exporter_adds_then_updates() {
        let backend = MemoryBackend::with_standard_folders();
        let mut exporter = backend.hierarchy_exporter().unwrap();
        exporter
            .configure(&SyncState::empty(), &ContentParameters::default())
            .unwrap();
        assert_eq!(exporter.change_count(), 9);
        while exporter.next_change().unwrap().is_some() {}
        let state = exporter.state().unwrap();
        drop(exporter);

        backend.add_folder(FolderEntry::new("inbox", "0", "Mail", FolderType::Inbox));
        backend.remove_folder("notes");
        let mut exporter = backend.hierarchy_exporter().unwrap();
        exporter
            .configure(&state, &ContentParameters::default())
            .unwrap();
        assert!(matches!(
            exporter.next_change().unwrap(),
            Some(ChangeOperation::Modify { .. })
        ));
        assert_eq!(
            exporter.next_change().unwrap(),
            Some(ChangeOperation::Remove {
                server_id: "notes".into()
            })
        );
    }

    #[test]
    fn delivered_mime_becomes_mail() {
        let backend = MemoryBackend::with_standard_folders();
        let id = backend
            .deliver_mime(
                "inbox",
                "Subject: Lunch\nFrom: bob@example.com\nContent-Type: text/plain\n\nAt noon\n",
            )
            .unwrap();
        let item = backend.item("inbox", &id).unwrap();
        assert_eq!(item.text(email::SUBJECT), Some("Lunch"));
        assert_eq!(item.read_flag(), Some(false));
        assert_eq!(item.body_text(), Some("At noon\r\n"));
    }

    #[test]
    fn gal_search_ranges() {
        let backend = MemoryBackend::new();
        for name in ["Ann Archer", "Andy Ames", "Bob Brown"] {
            backend.add_gal_entry(GalEntry {
                display_name: Some(name.to_string()),
                ..GalEntry::default()
            });
        }
        let results = backend.search_gal("an", (0, 0)).unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(results.entries.len(), 1);
        assert_eq!(results.range, (0, 0));

        let results = backend.search_gal("an", (0, 99)).unwrap();
        assert_eq!(results.range, (0, 1));
        assert!(backend.search_gal("zed", (0, 9)).unwrap().entries.is_empty());
    }

    #[test]
    fn send_mail_requires_parent_for_reply() {
        let backend = MemoryBackend::with_standard_folders();
        let mail = OutgoingMail {
            rfc822: b"Subject: re\n\nok".to_vec(),
            kind: ComposeKind::Reply,
            parent: None,
            save_in_sent: true,
            replace_mime: false,
            client_id: None,
        };
        let err = backend.send_mail(&mail).unwrap_err();
        assert_eq!(err.status_code(), Some(CommonStatus::ItemNotFound.code()));

        let mail = OutgoingMail {
            kind: ComposeKind::New,
            ..mail
        };
        backend.send_mail(&mail).unwrap();
        assert_eq!(backend.sent_mail().len(), 1);
        assert_eq!(backend.item_count("sent"), 1);
    }
}
