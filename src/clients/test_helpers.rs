//! Shared test helpers for the client adapter tests: scripted proxies and
//! config/slot builders.

use crate::clients::nzbget::{
    NzbgetHistoryItem, NzbgetParameter, NzbgetProxy, NzbgetQueueItem, TRACKING_PARAMETER,
};
use crate::clients::sabnzbd::{
    SabnzbdAddResponse, SabnzbdHistoryResponse, SabnzbdHistorySlot, SabnzbdProxy,
    SabnzbdQueueResponse, SabnzbdQueueSlot, SabnzbdResult,
};
use crate::config::{ClientConfig, ClientKind};
use crate::error::DownloadClientError;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) fn sab_config(id: i64, category: Option<&str>) -> ClientConfig {
    ClientConfig {
        id,
        name: format!("sab-{}", id),
        kind: ClientKind::Sabnzbd,
        enable: true,
        host: "localhost".into(),
        port: 8080,
        use_tls: false,
        url_base: None,
        api_key: Some("5f7e4c1a".into()),
        username: None,
        password: None,
        category: category.map(String::from),
        recent_priority: Default::default(),
        older_priority: Default::default(),
        recent_age_days: 14,
    }
}

pub(crate) fn nzbget_config(id: i64, category: Option<&str>) -> ClientConfig {
    ClientConfig {
        id,
        name: format!("nzbget-{}", id),
        kind: ClientKind::Nzbget,
        enable: true,
        host: "localhost".into(),
        port: 6789,
        use_tls: false,
        url_base: None,
        api_key: None,
        username: Some("nzbget".into()),
        password: Some("tegbzn6789".into()),
        category: category.map(String::from),
        recent_priority: Default::default(),
        older_priority: Default::default(),
        recent_age_days: 14,
    }
}

pub(crate) fn queue_slot(id: &str, title: &str, category: &str, status: &str) -> SabnzbdQueueSlot {
    SabnzbdQueueSlot {
        nzo_id: id.to_string(),
        filename: title.to_string(),
        cat: category.to_string(),
        mb: "1000.00".into(),
        mbleft: "10.00".into(),
        timeleft: "0:00:10".into(),
        status: status.to_string(),
    }
}

pub(crate) fn history_slot(
    id: &str,
    title: &str,
    category: &str,
    status: &str,
) -> SabnzbdHistorySlot {
    SabnzbdHistorySlot {
        nzo_id: id.to_string(),
        name: title.to_string(),
        category: category.to_string(),
        bytes: 1024 * 1024 * 1024,
        status: status.to_string(),
        storage: if status == "Completed" {
            format!("/downloads/complete/{}", title)
        } else {
            String::new()
        },
        fail_message: if status == "Failed" {
            "Aborted, cannot be completed".into()
        } else {
            String::new()
        },
    }
}

pub(crate) fn nzbget_group(nzb_id: i64, title: &str, category: &str) -> NzbgetQueueItem {
    NzbgetQueueItem {
        nzb_id,
        nzb_name: title.to_string(),
        category: category.to_string(),
        file_size_lo: 1_073_741_824,
        file_size_hi: 0,
        remaining_size_lo: 1024,
        remaining_size_hi: 0,
        paused_size_lo: 0,
        paused_size_hi: 0,
        active_downloads: 1,
        parameters: vec![NzbgetParameter {
            name: TRACKING_PARAMETER.to_string(),
            value: format!("track{}", nzb_id),
        }],
    }
}

pub(crate) fn nzbget_history(nzb_id: i64, title: &str, category: &str) -> NzbgetHistoryItem {
    NzbgetHistoryItem {
        nzb_id,
        name: title.to_string(),
        category: category.to_string(),
        file_size_lo: 1_073_741_824,
        file_size_hi: 0,
        par_status: "SUCCESS".into(),
        unpack_status: "SUCCESS".into(),
        move_status: "SUCCESS".into(),
        script_status: "NONE".into(),
        delete_status: "NONE".into(),
        mark_status: "NONE".into(),
        dest_dir: format!("/downloads/complete/{}", title),
        parameters: vec![NzbgetParameter {
            name: TRACKING_PARAMETER.to_string(),
            value: format!("track{}", nzb_id),
        }],
    }
}

fn unreachable_backend() -> DownloadClientError {
    DownloadClientError::ConnectionFailed {
        name: "fake".into(),
        message: "connection refused".into(),
    }
}

/// Scripted SABnzbd proxy recording mutating calls
#[derive(Default)]
pub(crate) struct FakeSabnzbdProxy {
    pub queue: Mutex<SabnzbdQueueResponse>,
    pub history: Mutex<SabnzbdHistoryResponse>,
    pub queue_unreachable: AtomicBool,
    pub history_unreachable: AtomicBool,
    pub add_response: Mutex<Option<SabnzbdAddResponse>>,
    pub removed_from_queue: Mutex<Vec<String>>,
    pub removed_from_history: Mutex<Vec<String>>,
    pub retried: Mutex<Vec<String>>,
}

#[async_trait]
impl SabnzbdProxy for FakeSabnzbdProxy {
    async fn get_queue(&self) -> Result<SabnzbdQueueResponse, DownloadClientError> {
        if self.queue_unreachable.load(Ordering::SeqCst) {
            return Err(unreachable_backend());
        }
        Ok(self.queue.lock().unwrap().clone())
    }

    async fn get_history(&self) -> Result<SabnzbdHistoryResponse, DownloadClientError> {
        if self.history_unreachable.load(Ordering::SeqCst) {
            return Err(unreachable_backend());
        }
        Ok(self.history.lock().unwrap().clone())
    }

    async fn add_url(
        &self,
        _url: &str,
        _nzb_name: &str,
        _category: Option<&str>,
        _priority: i32,
    ) -> Result<SabnzbdAddResponse, DownloadClientError> {
        match self.add_response.lock().unwrap().clone() {
            Some(response) => Ok(response),
            None => Ok(SabnzbdAddResponse {
                status: true,
                nzo_ids: vec!["SABnzbd_nzo_added".into()],
                error: None,
            }),
        }
    }

    async fn remove_queue_item(
        &self,
        id: &str,
        _delete_files: bool,
    ) -> Result<SabnzbdResult, DownloadClientError> {
        self.removed_from_queue.lock().unwrap().push(id.to_string());
        Ok(SabnzbdResult {
            status: true,
            error: None,
        })
    }

    async fn remove_history_item(
        &self,
        id: &str,
        _delete_files: bool,
    ) -> Result<SabnzbdResult, DownloadClientError> {
        self.removed_from_history
            .lock()
            .unwrap()
            .push(id.to_string());
        Ok(SabnzbdResult {
            status: true,
            error: None,
        })
    }

    async fn retry_item(&self, id: &str) -> Result<SabnzbdResult, DownloadClientError> {
        self.retried.lock().unwrap().push(id.to_string());
        Ok(SabnzbdResult {
            status: true,
            error: None,
        })
    }

    async fn get_version(&self) -> Result<String, DownloadClientError> {
        Ok("3.7.2".into())
    }
}

/// Scripted NzbGet proxy recording mutating calls
#[derive(Default)]
pub(crate) struct FakeNzbgetProxy {
    pub groups: Mutex<Vec<NzbgetQueueItem>>,
    pub history_items: Mutex<Vec<NzbgetHistoryItem>>,
    pub groups_unreachable: AtomicBool,
    pub history_unreachable: AtomicBool,
    pub append_result: Mutex<i64>,
    pub append_calls: Mutex<Vec<(String, Vec<NzbgetParameter>)>>,
    pub edit_calls: Mutex<Vec<(String, Vec<i64>)>>,
}

impl FakeNzbgetProxy {
    pub(crate) fn accepting(nzb_id: i64) -> Self {
        let proxy = Self::default();
        *proxy.append_result.lock().unwrap() = nzb_id;
        proxy
    }
}

#[async_trait]
impl NzbgetProxy for FakeNzbgetProxy {
    async fn list_groups(&self) -> Result<Vec<NzbgetQueueItem>, DownloadClientError> {
        if self.groups_unreachable.load(Ordering::SeqCst) {
            return Err(unreachable_backend());
        }
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn history(&self) -> Result<Vec<NzbgetHistoryItem>, DownloadClientError> {
        if self.history_unreachable.load(Ordering::SeqCst) {
            return Err(unreachable_backend());
        }
        Ok(self.history_items.lock().unwrap().clone())
    }

    async fn append(
        &self,
        file_name: &str,
        _content_url: &str,
        _category: Option<&str>,
        _priority: i32,
        parameters: &[NzbgetParameter],
    ) -> Result<i64, DownloadClientError> {
        self.append_calls
            .lock()
            .unwrap()
            .push((file_name.to_string(), parameters.to_vec()));
        Ok(*self.append_result.lock().unwrap())
    }

    async fn edit_queue(&self, command: &str, ids: &[i64]) -> Result<bool, DownloadClientError> {
        self.edit_calls
            .lock()
            .unwrap()
            .push((command.to_string(), ids.to_vec()));
        Ok(true)
    }

    async fn version(&self) -> Result<String, DownloadClientError> {
        Ok("21.1".into())
    }
}
