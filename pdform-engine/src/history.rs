use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct HistoryEntry<T> {
    label: String,
    state: T,
}

/// 基于快照的撤销/重做栈。每条记录保存操作前的完整状态，超出上限时丢弃最旧的记录。
#[derive(Debug, Clone)]
pub struct History<T> {
    undo: VecDeque<HistoryEntry<T>>,
    redo: Vec<HistoryEntry<T>>,
    limit: usize,
}

impl<T> History<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// 记录一次变更前的状态。新记录会清空重做栈。
    pub fn record(&mut self, label: impl Into<String>, before: T) {
        self.redo.clear();
        self.undo.push_back(HistoryEntry {
            label: label.into(),
            state: before,
        });
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// 撤销：传入当前状态（压入重做栈），返回标签与需要恢复的旧状态。
    pub fn undo(&mut self, current: T) -> Option<(String, T)> {
        let entry = self.undo.pop_back()?;
        self.redo.push(HistoryEntry {
            label: entry.label.clone(),
            state: current,
        });
        Some((entry.label, entry.state))
    }

    pub fn redo(&mut self, current: T) -> Option<(String, T)> {
        let entry = self.redo.pop()?;
        self.undo.push_back(HistoryEntry {
            label: entry.label.clone(),
            state: current,
        });
        Some((entry.label, entry.state))
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo.back().map(|entry| entry.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|entry| entry.label.as_str())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }
}
