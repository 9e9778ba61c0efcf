/*
 Copyright FMS Guardrails Orchestrator Authors

 Licensed under the Apache License, Version 2.0 (the "License");
 you may not use this file except in compliance with the License.
 You may obtain a copy of the License at

     http://www.apache.org/licenses/LICENSE-2.0

 Unless required by applicable law or agreed to in writing, software
 distributed under the License is distributed on an "AS IS" BASIS,
 WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 See the License for the specific language governing permissions and
 limitations under the License.

*/

use hyper::Uri;
use url::Url;

pub mod trace;

/// Simple trait used to extend `url::Url` with functionality to transform into `hyper::Uri`.
pub trait AsUriExt {
    fn as_uri(&self) -> Result<Uri, http::uri::InvalidUri>;
}

impl AsUriExt for Url {
    fn as_uri(&self) -> Result<Uri, http::uri::InvalidUri> {
        Uri::try_from(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_uri() {
        let url = Url::parse("https://jsonplaceholder.typicode.com/posts/1/comments").unwrap();
        let uri = url.as_uri().unwrap();
        assert_eq!(uri.host(), Some("jsonplaceholder.typicode.com"));
        assert_eq!(uri.path(), "/posts/1/comments");
    }
}
