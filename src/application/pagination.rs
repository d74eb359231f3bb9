//! Paging state machines, one per collection.
//!
//! A cursor builds the next page request from its offsets, merges the page
//! it gets back and decides whether another page follows. Cursors never
//! talk to the network themselves; the orchestrator sends what they build.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::format::fill_left;
use crate::domain::rpc::{CategoryPeers, MessagesPage, Page, TopPeerCategory, TopPeersPage};
use crate::domain::{
    AppError, Chat, ContactsList, DialogInfo, DialogType, DialogsInfo, ExportSettings, InputPeer,
    MessageOrder, MessageRange, MessagesSlice, PeerId, Photo, Request, Result, Types,
    UserpicsInfo, UserpicsSlice,
};

pub const USERPICS_SLICE_LIMIT: i32 = 100;
pub const CHATS_SLICE_LIMIT: i32 = 100;
pub const MESSAGES_SLICE_LIMIT: i32 = 100;
pub const TOP_PEER_SLICE_LIMIT: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    /// A request was built and its page has not been accepted yet.
    Requesting,
    Accumulating,
    MorePages,
    Done,
}

/// Common shape of every collection cursor.
pub trait PaginationCursor {
    type Page;
    type Output;

    fn state(&self) -> CursorState;

    /// Request for the next page, or `None` once the cursor is done.
    fn next_request(&mut self) -> Option<Request>;

    /// Merge one page and decide whether more follow.
    ///
    /// # Errors
    /// Returns an error for sentinel pages that a takeout session must
    /// never produce.
    fn accept(&mut self, page: Self::Page) -> Result<Self::Output>;

    fn is_done(&self) -> bool {
        self.state() == CursorState::Done
    }
}

fn begin_request(state: &mut CursorState) -> bool {
    match state {
        CursorState::Idle | CursorState::MorePages => {
            *state = CursorState::Requesting;
            true
        }
        _ => false,
    }
}

fn expect_requesting(state: CursorState, what: &str) -> Result<()> {
    if state == CursorState::Requesting {
        Ok(())
    } else {
        Err(AppError::invalid(format!(
            "{what} page accepted while cursor is {state:?}"
        )))
    }
}

/// Profile pictures, newest first, bounded by the last seen photo id.
#[derive(Debug)]
pub struct UserpicsCursor {
    state: CursorState,
    max_id: u64,
    processed: i32,
}

/// Result of one userpics page: totals on the first page plus the slice.
#[derive(Debug)]
pub struct UserpicsPage {
    pub info: Option<UserpicsInfo>,
    pub slice: UserpicsSlice,
}

impl Default for UserpicsCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl UserpicsCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: CursorState::Idle,
            max_id: 0,
            processed: 0,
        }
    }

    #[must_use]
    pub const fn processed(&self) -> i32 {
        self.processed
    }
}

impl PaginationCursor for UserpicsCursor {
    type Page = Page<Photo>;
    type Output = UserpicsPage;

    fn state(&self) -> CursorState {
        self.state
    }

    fn next_request(&mut self) -> Option<Request> {
        begin_request(&mut self.state).then(|| Request::GetUserPhotos {
            offset: 0,
            max_id: self.max_id,
            limit: USERPICS_SLICE_LIMIT,
        })
    }

    fn accept(&mut self, page: Page<Photo>) -> Result<UserpicsPage> {
        expect_requesting(self.state, "Userpics")?;
        if matches!(page, Page::NotModified) {
            return Err(AppError::api("Unexpected photosNotModified received."));
        }
        self.state = CursorState::Accumulating;
        let info = (self.processed == 0).then(|| UserpicsInfo {
            count: page.total(),
        });
        let last = page.is_last();
        let list = page.into_items();
        if let Some(photo) = list.last() {
            self.max_id = photo.id;
        }
        self.processed += i32::try_from(list.len()).unwrap_or(i32::MAX);
        self.state = if last || list.is_empty() {
            CursorState::Done
        } else {
            CursorState::MorePages
        };
        Ok(UserpicsPage {
            info,
            slice: UserpicsSlice { list },
        })
    }
}

/// Dialogs collected so far, deduplicated by peer.
#[derive(Debug, Default)]
pub struct DialogsAccumulator {
    list: Vec<DialogInfo>,
    index_by_peer: HashMap<PeerId, usize>,
}

impl DialogsAccumulator {
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    #[must_use]
    pub fn into_list(self) -> Vec<DialogInfo> {
        self.list
    }

    /// Merge dialogs found in `split_index`.
    ///
    /// A dialog already present only gains the split. A basic group that
    /// migrated into a known supergroup is folded into it under negative
    /// split indices.
    pub fn append(
        &mut self,
        items: Vec<DialogInfo>,
        split_index: i32,
        splits_count: i32,
        types: Types,
    ) {
        let good_by_types = |info: &DialogInfo| types.intersects(Types::for_dialog(info.dialog_type));
        for info in items {
            let migrated = info.migrated_to_channel_id != 0;
            if !good_by_types(&info) && !(migrated && types.intersects(Types::GROUPS)) {
                continue;
            }
            if migrated {
                let target = PeerId::channel(info.migrated_to_channel_id);
                if let Some(&index) = self.index_by_peer.get(&target) {
                    if add_migrate_from(&mut self.list[index], &info, split_index, splits_count) {
                        continue;
                    }
                }
                if !good_by_types(&info) {
                    continue;
                }
            }
            let next_index = self.list.len();
            let index = *self.index_by_peer.entry(info.peer_id).or_insert(next_index);
            if index == next_index {
                self.list.push(info);
            }
            let entry = &mut self.list[index];
            entry.splits.push(split_index);
            entry.messages_count_per_split.push(0);
        }
    }
}

fn add_migrate_from(to: &mut DialogInfo, from: &DialogInfo, split_index: i32, splits_count: i32) -> bool {
    let good = match &to.migrated_from_input {
        InputPeer::Empty => true,
        InputPeer::Chat { chat_id } => PeerId::chat(*chat_id) == from.peer_id,
        _ => false,
    };
    if !good {
        return false;
    }
    for (split, count) in from.splits.iter().zip(&from.messages_count_per_split) {
        to.splits.push(split - splits_count);
        to.messages_count_per_split.push(*count);
    }
    to.migrated_from_input = from.input.clone();
    to.splits.push(split_index - splits_count);
    to.messages_count_per_split.push(0);
    true
}

/// Open dialogs, walking splits from the last one down.
#[derive(Debug)]
pub struct DialogsCursor {
    state: CursorState,
    splits: Vec<MessageRange>,
    split_index_plus_one: usize,
    use_only_last_split: bool,
    types: Types,
    offset_date: i64,
    offset_id: i32,
    offset_peer: InputPeer,
    chats: DialogsAccumulator,
}

impl DialogsCursor {
    #[must_use]
    pub fn new(splits: Vec<MessageRange>, types: Types, use_only_last_split: bool) -> Self {
        let split_index_plus_one = splits.len();
        Self {
            state: if splits.is_empty() {
                CursorState::Done
            } else {
                CursorState::Idle
            },
            splits,
            split_index_plus_one,
            use_only_last_split,
            types,
            offset_date: 0,
            offset_id: 0,
            offset_peer: InputPeer::Empty,
            chats: DialogsAccumulator::default(),
        }
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.chats.len()
    }

    #[must_use]
    pub fn into_chats(self) -> Vec<DialogInfo> {
        self.chats.into_list()
    }

    fn split_index(&self) -> usize {
        self.split_index_plus_one.saturating_sub(1)
    }

    fn reset_offsets(&mut self) {
        self.offset_date = 0;
        self.offset_id = 0;
        self.offset_peer = InputPeer::Empty;
    }
}

impl PaginationCursor for DialogsCursor {
    type Page = Page<DialogInfo>;
    type Output = ();

    fn state(&self) -> CursorState {
        self.state
    }

    fn next_request(&mut self) -> Option<Request> {
        let range = *self.splits.get(self.split_index())?;
        begin_request(&mut self.state).then(|| {
            Request::GetDialogs {
                offset_date: self.offset_date,
                offset_id: self.offset_id,
                offset_peer: self.offset_peer.clone(),
                limit: CHATS_SLICE_LIMIT,
            }
            .with_range(range)
        })
    }

    fn accept(&mut self, page: Page<DialogInfo>) -> Result<()> {
        expect_requesting(self.state, "Dialogs")?;
        if matches!(page, Page::NotModified) {
            return Err(AppError::api("Unexpected dialogsNotModified received."));
        }
        self.state = CursorState::Accumulating;
        let finished = page.is_last();
        let items = page.into_items();
        let boundary = items
            .last()
            .map(|last| (last.top_message_date, last.top_message_id, last.input.clone()));

        let split_index = i32::try_from(self.split_index()).unwrap_or(i32::MAX);
        let splits_count = i32::try_from(self.splits.len()).unwrap_or(i32::MAX);
        self.chats.append(items, split_index, splits_count, self.types);

        match boundary {
            Some((date, id, peer)) if !finished && date > 0 => {
                self.offset_date = date;
                self.offset_id = id;
                self.offset_peer = peer;
                self.state = CursorState::MorePages;
            }
            _ if !self.use_only_last_split && self.split_index_plus_one > 1 => {
                self.split_index_plus_one -= 1;
                self.reset_offsets();
                self.state = CursorState::MorePages;
            }
            _ => self.state = CursorState::Done,
        }
        Ok(())
    }
}

/// Classify a chat the account has left.
#[must_use]
pub fn left_channel_info(chat: &Chat) -> DialogInfo {
    let dialog_type = match (chat.is_broadcast, chat.username.is_empty()) {
        (true, true) => DialogType::PrivateChannel,
        (true, false) => DialogType::PublicChannel,
        (false, true) => DialogType::PrivateSupergroup,
        (false, false) => DialogType::PublicSupergroup,
    };
    DialogInfo {
        dialog_type,
        name: chat.title.clone(),
        input: chat.input(),
        peer_id: chat.peer_id(),
        is_left_channel: true,
        ..DialogInfo::default()
    }
}

/// Channels the account has left, paged by list offset.
#[derive(Debug)]
pub struct LeftChannelsCursor {
    state: CursorState,
    offset: i32,
    full_count: i32,
    split_index: i32,
    splits_count: i32,
    types: Types,
    left: DialogsAccumulator,
}

impl LeftChannelsCursor {
    /// Left channels are attributed to the last split.
    #[must_use]
    pub fn new(splits_count: usize, types: Types) -> Self {
        let splits_count = i32::try_from(splits_count.max(1)).unwrap_or(i32::MAX);
        Self {
            state: CursorState::Idle,
            offset: 0,
            full_count: 0,
            split_index: splits_count - 1,
            splits_count,
            types,
            left: DialogsAccumulator::default(),
        }
    }

    #[must_use]
    pub const fn full_count(&self) -> i32 {
        self.full_count
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.left.len()
    }

    #[must_use]
    pub fn into_left(self) -> Vec<DialogInfo> {
        self.left.into_list()
    }
}

impl PaginationCursor for LeftChannelsCursor {
    type Page = Page<Chat>;
    type Output = ();

    fn state(&self) -> CursorState {
        self.state
    }

    fn next_request(&mut self) -> Option<Request> {
        begin_request(&mut self.state).then(|| Request::GetLeftChannels {
            offset: self.offset,
        })
    }

    fn accept(&mut self, page: Page<Chat>) -> Result<()> {
        expect_requesting(self.state, "Left channels")?;
        if matches!(page, Page::NotModified) {
            return Err(AppError::api("Unexpected chatsNotModified received."));
        }
        self.state = CursorState::Accumulating;
        self.full_count = page.total();
        let finished = page.is_last();
        let chats = page.into_items();
        self.offset += i32::try_from(chats.len()).unwrap_or(i32::MAX);
        let infos = chats.iter().map(left_channel_info).collect();
        self.left
            .append(infos, self.split_index, self.splits_count, self.types);
        self.state = if finished {
            CursorState::Done
        } else {
            CursorState::MorePages
        };
        Ok(())
    }
}

/// Top peers by category, appended to the saved contacts.
#[derive(Debug)]
pub struct TopPeersCursor {
    state: CursorState,
    offset: i32,
    list: ContactsList,
}

impl TopPeersCursor {
    #[must_use]
    pub const fn new(list: ContactsList) -> Self {
        Self {
            state: CursorState::Idle,
            offset: 0,
            list,
        }
    }

    #[must_use]
    pub fn into_list(self) -> ContactsList {
        self.list
    }

    fn append(&mut self, category: CategoryPeers) -> bool {
        let received = i32::try_from(category.peers.len()).unwrap_or(i32::MAX);
        let loaded = self.offset.saturating_add(received) >= category.count;
        let target = match category.category {
            TopPeerCategory::Correspondents => &mut self.list.correspondents,
            TopPeerCategory::BotsInline => &mut self.list.inline_bots,
            TopPeerCategory::PhoneCalls => &mut self.list.phone_calls,
        };
        target.extend(category.peers);
        loaded
    }
}

impl PaginationCursor for TopPeersCursor {
    type Page = TopPeersPage;
    type Output = ();

    fn state(&self) -> CursorState {
        self.state
    }

    fn next_request(&mut self) -> Option<Request> {
        begin_request(&mut self.state).then(|| Request::GetTopPeers {
            offset: self.offset,
            limit: TOP_PEER_SLICE_LIMIT,
        })
    }

    fn accept(&mut self, page: TopPeersPage) -> Result<()> {
        expect_requesting(self.state, "Top peers")?;
        self.state = CursorState::Accumulating;
        let TopPeersPage::Peers { categories } = page else {
            self.state = CursorState::Done;
            return Ok(());
        };
        let mut loaded = true;
        for category in categories {
            loaded &= self.append(category);
        }
        if loaded {
            self.state = CursorState::Done;
        } else {
            let longest = [
                self.list.correspondents.len(),
                self.list.inline_bots.len(),
                self.list.phone_calls.len(),
            ]
            .into_iter()
            .max()
            .unwrap_or(0);
            self.offset = i32::try_from(longest).unwrap_or(i32::MAX);
            self.state = CursorState::MorePages;
        }
        Ok(())
    }
}

/// Where one split of a dialog's history is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTarget {
    /// Index as stored on the dialog; negative for the migrated-from group.
    pub split_index: i32,
    pub range: MessageRange,
    pub peer: InputPeer,
    pub migrated: bool,
}

impl SplitTarget {
    /// Resolve a dialog's split index against the global split list.
    #[must_use]
    pub fn resolve(dialog: &DialogInfo, split_index: i32, splits: &[MessageRange]) -> Option<Self> {
        let count = i32::try_from(splits.len()).ok()?;
        let migrated = split_index < 0;
        let real = if migrated { count + split_index } else { split_index };
        let range = *splits.get(usize::try_from(real).ok()?)?;
        Some(Self {
            split_index,
            range,
            peer: if migrated {
                dialog.migrated_from_input.clone()
            } else {
                dialog.input.clone()
            },
            migrated,
        })
    }
}

/// One dialog's history inside one split.
///
/// A fresh cursor is started per split with [`MessagesCursor::begin_split`];
/// message ids seen in earlier splits of the same dialog are dropped.
#[derive(Debug)]
pub struct MessagesCursor {
    state: CursorState,
    order: MessageOrder,
    only_my_messages: bool,
    target: Option<SplitTarget>,
    boundary: Option<i32>,
    seen: HashSet<i32>,
}

impl MessagesCursor {
    #[must_use]
    pub fn new(order: MessageOrder, only_my_messages: bool) -> Self {
        Self {
            state: CursorState::Done,
            order,
            only_my_messages,
            target: None,
            boundary: None,
            seen: HashSet::new(),
        }
    }

    pub fn begin_split(&mut self, target: SplitTarget) {
        self.target = Some(target);
        self.boundary = None;
        self.state = CursorState::Idle;
    }

    /// Drop the current split so the next one starts from a clean state.
    /// Seen ids and the only-my-messages mode are kept.
    pub fn reset(&mut self) {
        self.target = None;
        self.boundary = None;
        self.state = CursorState::Done;
    }

    #[must_use]
    pub const fn only_my_messages(&self) -> bool {
        self.only_my_messages
    }

    #[must_use]
    pub const fn target(&self) -> Option<&SplitTarget> {
        self.target.as_ref()
    }

    /// Fall back to the account's own messages after a private-channel
    /// error. Returns false when the fallback does not apply or was
    /// already taken; the pending request may then be rebuilt.
    pub fn switch_to_only_my_messages(&mut self) -> bool {
        let applies = self
            .target
            .as_ref()
            .is_some_and(|target| target.peer.is_channel());
        if !applies || self.only_my_messages {
            return false;
        }
        self.only_my_messages = true;
        if self.state == CursorState::Requesting {
            self.state = CursorState::MorePages;
        }
        true
    }

    /// Request that reads a single message at one end of the split, used
    /// for counting and date-window checks.
    #[must_use]
    pub fn edge_request(&self, oldest: bool) -> Option<Request> {
        let target = self.target.as_ref()?;
        let (offset_id, add_offset) = if oldest { (1, -1) } else { (0, 0) };
        Some(self.history_request(target, offset_id, add_offset, 1))
    }

    fn history_request(&self, target: &SplitTarget, offset_id: i32, add_offset: i32, limit: i32) -> Request {
        let request = if self.only_my_messages {
            Request::Search {
                peer: target.peer.clone(),
                from: InputPeer::SelfPeer,
                offset_id,
                add_offset,
                limit,
            }
        } else {
            Request::GetHistory {
                peer: target.peer.clone(),
                offset_id,
                add_offset,
                limit,
            }
        };
        request.with_range(target.range)
    }
}

impl PaginationCursor for MessagesCursor {
    type Page = MessagesPage;
    type Output = MessagesSlice;

    fn state(&self) -> CursorState {
        self.state
    }

    fn next_request(&mut self) -> Option<Request> {
        let target = self.target.clone()?;
        if !begin_request(&mut self.state) {
            return None;
        }
        let (offset_id, add_offset) = match self.order {
            MessageOrder::NewestFirst => (self.boundary.unwrap_or(0), 0),
            MessageOrder::OldestFirst => (self.boundary.unwrap_or(1), -MESSAGES_SLICE_LIMIT),
        };
        Some(self.history_request(&target, offset_id, add_offset, MESSAGES_SLICE_LIMIT))
    }

    fn accept(&mut self, page: MessagesPage) -> Result<MessagesSlice> {
        expect_requesting(self.state, "Messages")?;
        if matches!(page.page, Page::NotModified) {
            return Err(AppError::api("Unexpected messagesNotModified received."));
        }
        self.state = CursorState::Accumulating;
        let complete = matches!(page.page, Page::Complete { .. });
        let mut list = page.page.into_items();
        match self.order {
            MessageOrder::NewestFirst => list.sort_by(|a, b| b.id.cmp(&a.id)),
            MessageOrder::OldestFirst => list.sort_by_key(|message| message.id),
        }
        let next_boundary = list.last().map(|edge| match self.order {
            MessageOrder::NewestFirst => edge.id,
            MessageOrder::OldestFirst => edge.id.saturating_add(1),
        });
        let last = complete || list.is_empty() || next_boundary.is_some_and(|b| b <= 1);

        if self.target.as_ref().is_some_and(|target| target.migrated) {
            for message in &mut list {
                message.adjust_migrated_ids();
            }
        }
        list.retain(|message| self.seen.insert(message.id));

        self.boundary = next_boundary;
        self.state = if last {
            CursorState::Done
        } else {
            CursorState::MorePages
        };
        let peers: BTreeMap<_, _> = page.peers.into_iter().map(|peer| (peer.id(), peer)).collect();
        Ok(MessagesSlice { list, peers })
    }
}

/// Assign output folders and history modes once listing is complete.
pub fn finalize_dialogs_info(info: &mut DialogsInfo, settings: &ExportSettings) {
    let full_count = info.len();
    let last_number = full_count.saturating_sub(1);
    let single_peer = settings.only_single_peer();
    let mut index = 0;
    for dialog in &mut info.chats {
        index += 1;
        dialog.relative_path = if single_peer {
            String::new()
        } else {
            format!("chats/chat_{}/", fill_left(index, last_number))
        };
        let setting = Types::for_dialog(dialog.dialog_type);
        dialog.only_my_messages =
            dialog.dialog_type != DialogType::Personal && !settings.full_chats.contains(setting);
        let mut pairs: Vec<_> = dialog
            .splits
            .iter()
            .copied()
            .zip(dialog.messages_count_per_split.iter().copied())
            .collect();
        pairs.sort_by_key(|(split, _)| *split);
        let (splits, counts): (Vec<i32>, Vec<i32>) = pairs.into_iter().unzip();
        dialog.splits = splits;
        dialog.messages_count_per_split = counts;
    }
    for dialog in &mut info.left {
        index += 1;
        dialog.relative_path = format!("chats/chat_{}/", fill_left(index, last_number));
        dialog.only_my_messages = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, TopPeer, User};

    fn dialog(peer: u64, date: i64) -> DialogInfo {
        DialogInfo {
            dialog_type: DialogType::Personal,
            name: format!("user{peer}"),
            input: InputPeer::User {
                user_id: peer,
                access_hash: 0,
            },
            peer_id: PeerId::user(peer),
            top_message_id: i32::try_from(peer).unwrap(),
            top_message_date: date,
            ..DialogInfo::default()
        }
    }

    fn splits(count: usize) -> Vec<MessageRange> {
        (0..count)
            .map(|i| {
                let base = i32::try_from(i).unwrap() * 1000;
                MessageRange {
                    min_id: base + 1,
                    max_id: base + 1000,
                }
            })
            .collect()
    }

    #[test]
    fn test_dialogs_dedup_across_splits() {
        let mut cursor = DialogsCursor::new(splits(2), Types::ANY_CHATS, false);

        let first = cursor.next_request().unwrap();
        assert!(matches!(
            first,
            Request::WithMessagesRange { range, .. } if range.min_id == 1001
        ));
        cursor
            .accept(Page::Complete {
                items: vec![dialog(1, 50), dialog(2, 40)],
            })
            .unwrap();
        assert_eq!(cursor.state(), CursorState::MorePages);

        let second = cursor.next_request().unwrap();
        assert!(matches!(
            second,
            Request::WithMessagesRange { range, .. } if range.min_id == 1
        ));
        cursor
            .accept(Page::Complete {
                items: vec![dialog(2, 30), dialog(3, 20)],
            })
            .unwrap();
        assert!(cursor.is_done());
        assert!(cursor.next_request().is_none());

        let chats = cursor.into_chats();
        assert_eq!(chats.len(), 3);
        let twice = chats.iter().find(|d| d.peer_id == PeerId::user(2)).unwrap();
        assert_eq!(twice.splits, vec![1, 0]);
        assert_eq!(twice.messages_count_per_split, vec![0, 0]);
    }

    #[test]
    fn test_dialogs_offsets_follow_last_item() {
        let mut cursor = DialogsCursor::new(splits(1), Types::ANY_CHATS, false);
        cursor.next_request().unwrap();
        cursor
            .accept(Page::Slice {
                count: 3,
                items: vec![dialog(1, 90), dialog(2, 80)],
            })
            .unwrap();
        let request = cursor.next_request().unwrap();
        match request.inner() {
            Request::GetDialogs {
                offset_date,
                offset_id,
                offset_peer,
                ..
            } => {
                assert_eq!(*offset_date, 80);
                assert_eq!(*offset_id, 2);
                assert_eq!(
                    offset_peer,
                    &InputPeer::User {
                        user_id: 2,
                        access_hash: 0
                    }
                );
            }
            other => panic!("unexpected request {other:?}"),
        }
        cursor
            .accept(Page::Slice {
                count: 3,
                items: vec![],
            })
            .unwrap();
        assert!(cursor.is_done());
    }

    #[test]
    fn test_dialogs_not_modified_is_error() {
        let mut cursor = DialogsCursor::new(splits(1), Types::ANY_CHATS, false);
        cursor.next_request().unwrap();
        assert!(cursor.accept(Page::NotModified).is_err());
    }

    #[test]
    fn test_dialogs_filtered_by_type() {
        let mut cursor = DialogsCursor::new(splits(1), Types::BOT_CHATS, false);
        cursor.next_request().unwrap();
        let mut bot = dialog(9, 10);
        bot.dialog_type = DialogType::Bot;
        cursor
            .accept(Page::Complete {
                items: vec![dialog(1, 20), bot],
            })
            .unwrap();
        let chats = cursor.into_chats();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].dialog_type, DialogType::Bot);
    }

    #[test]
    fn test_migrated_group_folds_into_supergroup() {
        let mut accumulator = DialogsAccumulator::default();
        let supergroup = DialogInfo {
            dialog_type: DialogType::PrivateSupergroup,
            peer_id: PeerId::channel(50),
            input: InputPeer::Channel {
                channel_id: 50,
                access_hash: 1,
            },
            ..DialogInfo::default()
        };
        let basic = DialogInfo {
            dialog_type: DialogType::PrivateGroup,
            peer_id: PeerId::chat(7),
            input: InputPeer::Chat { chat_id: 7 },
            migrated_to_channel_id: 50,
            ..DialogInfo::default()
        };
        accumulator.append(vec![supergroup], 1, 2, Types::PRIVATE_GROUPS);
        accumulator.append(vec![basic], 1, 2, Types::PRIVATE_GROUPS);
        let list = accumulator.into_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].splits, vec![1, -1]);
        assert_eq!(list[0].migrated_from_input, InputPeer::Chat { chat_id: 7 });
    }

    #[test]
    fn test_left_channels_paging() {
        let mut cursor = LeftChannelsCursor::new(3, Types::GROUPS_CHANNELS);
        let channel = |id| Chat {
            bare_id: id,
            title: format!("c{id}"),
            is_channel: true,
            is_broadcast: true,
            ..Chat::default()
        };
        assert_eq!(
            cursor.next_request(),
            Some(Request::GetLeftChannels { offset: 0 })
        );
        cursor
            .accept(Page::Slice {
                count: 3,
                items: vec![channel(1), channel(2)],
            })
            .unwrap();
        assert_eq!(cursor.full_count(), 3);
        assert_eq!(
            cursor.next_request(),
            Some(Request::GetLeftChannels { offset: 2 })
        );
        cursor
            .accept(Page::Slice {
                count: 3,
                items: vec![channel(2), channel(3)],
            })
            .unwrap();
        assert!(!cursor.is_done());
        cursor.next_request().unwrap();
        cursor
            .accept(Page::Slice {
                count: 3,
                items: vec![],
            })
            .unwrap();
        assert!(cursor.is_done());
        let left = cursor.into_left();
        assert_eq!(left.len(), 3);
        assert!(left
            .iter()
            .all(|d| d.is_left_channel && d.splits.iter().all(|split| *split == 2)));
    }

    #[test]
    fn test_userpics_cursor() {
        let photo = |id| Photo {
            id,
            ..Photo::default()
        };
        let mut cursor = UserpicsCursor::new();
        cursor.next_request().unwrap();
        let page = cursor
            .accept(Page::Slice {
                count: 3,
                items: vec![photo(30), photo(20)],
            })
            .unwrap();
        assert_eq!(page.info, Some(UserpicsInfo { count: 3 }));
        assert_eq!(
            cursor.next_request(),
            Some(Request::GetUserPhotos {
                offset: 0,
                max_id: 20,
                limit: USERPICS_SLICE_LIMIT
            })
        );
        let page = cursor
            .accept(Page::Slice {
                count: 3,
                items: vec![photo(10)],
            })
            .unwrap();
        assert!(page.info.is_none());
        cursor.next_request().unwrap();
        cursor
            .accept(Page::Slice {
                count: 3,
                items: vec![],
            })
            .unwrap();
        assert!(cursor.is_done());
        assert_eq!(cursor.processed(), 3);
    }

    #[test]
    fn test_accept_without_request_is_rejected() {
        let mut cursor = UserpicsCursor::new();
        assert!(cursor.accept(Page::Complete { items: vec![] }).is_err());
    }

    #[test]
    fn test_top_peers_offsets() {
        let peer = |id| TopPeer {
            peer: crate::domain::Peer::User(User {
                bare_id: id,
                ..User::default()
            }),
            rating: 1.0,
        };
        let mut cursor = TopPeersCursor::new(ContactsList::default());
        cursor.next_request().unwrap();
        cursor
            .accept(TopPeersPage::Peers {
                categories: vec![
                    CategoryPeers {
                        category: TopPeerCategory::Correspondents,
                        count: 3,
                        peers: vec![peer(1), peer(2)],
                    },
                    CategoryPeers {
                        category: TopPeerCategory::PhoneCalls,
                        count: 1,
                        peers: vec![peer(3)],
                    },
                ],
            })
            .unwrap();
        assert_eq!(
            cursor.next_request(),
            Some(Request::GetTopPeers {
                offset: 2,
                limit: TOP_PEER_SLICE_LIMIT
            })
        );
        cursor
            .accept(TopPeersPage::Peers {
                categories: vec![CategoryPeers {
                    category: TopPeerCategory::Correspondents,
                    count: 3,
                    peers: vec![peer(4)],
                }],
            })
            .unwrap();
        assert!(cursor.is_done());
        let list = cursor.into_list();
        assert_eq!(list.correspondents.len(), 3);
        assert_eq!(list.phone_calls.len(), 1);
    }

    #[test]
    fn test_top_peers_disabled_finishes() {
        let mut cursor = TopPeersCursor::new(ContactsList::default());
        cursor.next_request().unwrap();
        cursor.accept(TopPeersPage::Disabled).unwrap();
        assert!(cursor.is_done());
    }

    fn messages(ids: &[i32]) -> MessagesPage {
        MessagesPage {
            page: Page::Slice {
                count: 1000,
                items: ids
                    .iter()
                    .map(|&id| Message {
                        id,
                        ..Message::default()
                    })
                    .collect(),
            },
            peers: vec![],
        }
    }

    fn personal_target(split_index: i32) -> SplitTarget {
        SplitTarget {
            split_index,
            range: MessageRange::WHOLE,
            peer: InputPeer::User {
                user_id: 1,
                access_hash: 0,
            },
            migrated: false,
        }
    }

    #[test]
    fn test_messages_newest_first_boundaries() {
        let mut cursor = MessagesCursor::new(MessageOrder::NewestFirst, false);
        cursor.begin_split(personal_target(0));
        let first = cursor.next_request().unwrap();
        assert!(matches!(
            first.inner(),
            Request::GetHistory { offset_id: 0, add_offset: 0, .. }
        ));
        let slice = cursor.accept(messages(&[300, 299, 298])).unwrap();
        assert_eq!(slice.list.first().map(|m| m.id), Some(300));
        let second = cursor.next_request().unwrap();
        assert!(matches!(
            second.inner(),
            Request::GetHistory { offset_id: 298, add_offset: 0, .. }
        ));
        cursor.accept(messages(&[])).unwrap();
        assert!(cursor.is_done());
    }

    #[test]
    fn test_messages_oldest_first_boundaries() {
        let mut cursor = MessagesCursor::new(MessageOrder::OldestFirst, false);
        cursor.begin_split(personal_target(0));
        let first = cursor.next_request().unwrap();
        assert!(matches!(
            first.inner(),
            Request::GetHistory { offset_id: 1, add_offset: -100, limit: 100, .. }
        ));
        let slice = cursor.accept(messages(&[12, 10, 11])).unwrap();
        let ids: Vec<_> = slice.list.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        let second = cursor.next_request().unwrap();
        assert!(matches!(
            second.inner(),
            Request::GetHistory { offset_id: 13, .. }
        ));
    }

    #[test]
    fn test_messages_dedup_across_splits() {
        let mut cursor = MessagesCursor::new(MessageOrder::NewestFirst, false);
        cursor.begin_split(personal_target(0));
        cursor.next_request().unwrap();
        let slice = cursor.accept(messages(&[5, 4])).unwrap();
        assert_eq!(slice.list.len(), 2);
        cursor.next_request().unwrap();
        cursor.accept(messages(&[])).unwrap();

        cursor.begin_split(personal_target(1));
        cursor.next_request().unwrap();
        let slice = cursor.accept(messages(&[6, 5, 4])).unwrap();
        let ids: Vec<_> = slice.list.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![6]);
    }

    #[test]
    fn test_empty_page_ends_split() {
        let mut cursor = MessagesCursor::new(MessageOrder::NewestFirst, false);
        cursor.begin_split(personal_target(1));
        cursor.next_request().unwrap();
        let slice = cursor.accept(messages(&[])).unwrap();
        assert!(slice.list.is_empty());
        assert_eq!(cursor.state(), CursorState::Done);
        assert!(cursor.next_request().is_none());
    }

    #[test]
    fn test_reset_after_counting_leaves_no_split() {
        let mut cursor = MessagesCursor::new(MessageOrder::NewestFirst, false);
        cursor.begin_split(personal_target(0));
        assert!(cursor.edge_request(false).is_some());
        cursor.begin_split(personal_target(1));
        cursor.reset();
        assert!(cursor.is_done());
        assert!(cursor.target().is_none());
        assert!(cursor.edge_request(false).is_none());
        assert!(cursor.next_request().is_none());

        cursor.begin_split(personal_target(0));
        let first = cursor.next_request().unwrap();
        assert!(matches!(
            first.inner(),
            Request::GetHistory { offset_id: 0, limit: 100, .. }
        ));
    }

    #[test]
    fn test_only_my_messages_switch_applies_to_channels_once() {
        let mut cursor = MessagesCursor::new(MessageOrder::NewestFirst, false);
        cursor.begin_split(personal_target(0));
        cursor.next_request().unwrap();
        assert!(!cursor.switch_to_only_my_messages());

        let mut cursor = MessagesCursor::new(MessageOrder::NewestFirst, false);
        cursor.begin_split(SplitTarget {
            peer: InputPeer::Channel {
                channel_id: 9,
                access_hash: 2,
            },
            ..personal_target(0)
        });
        cursor.next_request().unwrap();
        assert!(cursor.switch_to_only_my_messages());
        assert!(!cursor.switch_to_only_my_messages());
        let retry = cursor.next_request().unwrap();
        assert!(matches!(
            retry.inner(),
            Request::Search { from: InputPeer::SelfPeer, .. }
        ));
    }

    #[test]
    fn test_split_target_resolves_migrated() {
        let info = DialogInfo {
            input: InputPeer::Channel {
                channel_id: 5,
                access_hash: 1,
            },
            migrated_from_input: InputPeer::Chat { chat_id: 3 },
            ..DialogInfo::default()
        };
        let ranges = splits(3);
        let target = SplitTarget::resolve(&info, -1, &ranges).unwrap();
        assert!(target.migrated);
        assert_eq!(target.range, ranges[2]);
        assert_eq!(target.peer, InputPeer::Chat { chat_id: 3 });
        assert!(SplitTarget::resolve(&info, 3, &ranges).is_none());
    }

    #[test]
    fn test_finalize_paths_and_modes() {
        let mut settings = ExportSettings::default();
        settings.full_chats = Types::PERSONAL_CHATS;
        let mut group = dialog(2, 0);
        group.dialog_type = DialogType::PrivateGroup;
        group.splits = vec![2, 0, 1];
        group.messages_count_per_split = vec![20, 0, 10];
        let mut info = DialogsInfo {
            chats: (0..10).map(|i| dialog(i, 0)).chain([group]).collect(),
            left: vec![DialogInfo::default()],
        };
        finalize_dialogs_info(&mut info, &settings);
        assert_eq!(info.chats[0].relative_path, "chats/chat_01/");
        assert_eq!(info.left[0].relative_path, "chats/chat_12/");
        assert!(!info.chats[0].only_my_messages);
        let group = &info.chats[10];
        assert!(group.only_my_messages);
        assert_eq!(group.splits, vec![0, 1, 2]);
        assert_eq!(group.messages_count_per_split, vec![0, 10, 20]);
        assert!(info.left[0].only_my_messages);
    }
}
