//! Sample data loaded at startup.

use tracing::info;

use crate::error::StorageResult;
use crate::traits::{DataStore, Dataset, PostRow, UserRow};

/// Two users, three posts: the first user owns two of them.
pub fn sample_dataset() -> Dataset {
    let user = |id, name: &str, age| UserRow {
        id,
        name: name.to_string(),
        age,
    };
    let post = |id, content: &str, user_id| PostRow {
        id,
        content: content.to_string(),
        user_id,
    };

    Dataset {
        users: vec![user(1, "John Doe", 25), user(2, "Jane Doe", 30)],
        posts: vec![
            post(1, "Post-1", 1),
            post(2, "Post-2", 1),
            post(3, "Post-3", 2),
        ],
    }
}

/// Replaces the store contents with [`sample_dataset`].
pub async fn seed<S>(store: &S) -> StorageResult<()>
where
    S: DataStore + ?Sized,
{
    let dataset = sample_dataset();
    let (users, posts) = (dataset.users.len(), dataset.posts.len());
    store.replace_all(dataset).await?;
    info!(backend = store.backend(), users, posts, "seeded sample data");
    Ok(())
}
