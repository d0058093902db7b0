//! Result message rendering

use crate::config::LinkConfig;
use crate::job::JobOptions;
use crate::notify::LinkButton;
use crate::sink::DeliveredFile;
use crate::utils::{escape_html, quote_path, readable_file_size};

/// `Name`/`Size` block every result message starts with
pub(crate) fn header(name: &str, size: u64) -> String {
    format!(
        "<b>Name: </b><code>{}</code>\n\n<b>Size: </b>{}",
        escape_html(name),
        readable_file_size(size)
    )
}

/// Split a leech result into messages of at most `budget` bytes
///
/// Each message is `head` followed by a numbered run of file links. A line that
/// would push the message past the budget starts a new one; only a single line
/// too long to fit on its own may overshoot. With no files the head is sent on
/// its own.
pub fn leech_pages(head: &str, files: &[DeliveredFile], budget: usize) -> Vec<String> {
    if files.is_empty() {
        return vec![head.to_string()];
    }

    let mut pages = Vec::new();
    let mut page = String::new();
    for (index, file) in files.iter().enumerate() {
        let line = format!(
            "{}. <a href='{}'>{}</a>\n",
            index + 1,
            file.link,
            escape_html(&file.name)
        );
        if !page.is_empty() && head.len() + page.len() + line.len() > budget {
            pages.push(format!("{head}{page}"));
            page.clear();
        }
        page.push_str(&line);
    }
    pages.push(format!("{head}{page}"));
    pages
}

/// Everything the cloud summary needs from an upload outcome
pub struct CloudResult<'a> {
    /// Direct link
    pub link: Option<&'a str>,
    /// Files uploaded
    pub files: usize,
    /// Sub-folders uploaded
    pub folders: usize,
    /// MIME type, or `"Folder"`
    pub mime_type: &'a str,
    /// rclone `remote:path`
    pub remote_path: Option<&'a str>,
    /// Drive folder id
    pub dir_id: Option<&'a str>,
}

/// Render a drive/rclone result: message body plus link buttons
pub fn cloud_summary(
    head: &str,
    result: &CloudResult<'_>,
    options: &JobOptions,
    links: &LinkConfig,
    tag: &str,
) -> (String, Vec<LinkButton>) {
    let mut msg = format!("{head}\n\n<b>Type: </b>{}", result.mime_type);
    let is_folder = result.mime_type == "Folder";
    if is_folder {
        msg.push_str(&format!(
            "\n<b>SubFolders: </b>{}\n<b>Files: </b>{}",
            result.folders, result.files
        ));
    }

    let path_line = format!(
        "\n\nPath: <code>{}</code>",
        escape_html(result.remote_path.unwrap_or_default())
    );
    let serve_url = links
        .rclone_serve_url
        .as_deref()
        .filter(|url| !url.is_empty() && !options.private_link);
    let rclone_share = result.remote_path.zip(serve_url);

    let mut buttons = Vec::new();
    if result.link.is_none() && rclone_share.is_none() {
        msg.push_str(&path_line);
    } else {
        match result.link {
            Some(link) => buttons.push(LinkButton::new("Cloud Link", link)),
            None => msg.push_str(&path_line),
        }

        if let Some((remote_path, serve_url)) = rclone_share {
            let (remote, path) = remote_path.split_once(':').unwrap_or((remote_path, ""));
            let mut share_url = format!(
                "{}/{}/{}",
                serve_url.trim_end_matches('/'),
                remote,
                quote_path(path)
            );
            if is_folder {
                share_url.push('/');
            }
            buttons.push(LinkButton::new("Rclone Link", share_url));
        }

        if let (None, Some(dir_id)) = (result.remote_path, result.dir_id) {
            let index_url = if options.private_link {
                options.user_index_url.as_deref()
            } else {
                links.index_url.as_deref()
            };
            if let Some(index_url) = index_url.filter(|url| !url.is_empty()) {
                buttons.push(LinkButton::new(
                    "Index Link",
                    format!("{index_url}findpath?id={dir_id}"),
                ));
                let viewable = ["image", "video", "audio"]
                    .iter()
                    .any(|kind| result.mime_type.starts_with(kind));
                if viewable {
                    buttons.push(LinkButton::new(
                        "View Link",
                        format!("{index_url}findpath?id={dir_id}&view=true"),
                    ));
                }
            }
        }
    }

    msg.push_str(&format!("\n\n<b>cc: </b>{tag}"));
    (msg, buttons)
}
