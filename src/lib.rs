//! 컨텐츠 모더레이션 백엔드의 동기 처리 코어.
//!
//! 전송 계층(이벤트 기반 요청/응답 채널)이 [`processing::ProcessingOrchestrator`]에
//! 배치를 넘기면, 요청은 컨텐츠 타입별 admission 풀을 거쳐 이미지/텍스트
//! AI 컨테이너로 전달되고, 세션 설정이 반영된 항목별 차단 결정이 돌아온다.

pub mod app;
pub mod backend;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod processing;
pub mod scheduler;
pub mod store;
